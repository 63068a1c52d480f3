//! SQL schema for the Quill SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subdomains (
    subdomain_id TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    sla_hours    INTEGER NOT NULL,
    is_active    INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subdomain_experts (
    subdomain_id TEXT NOT NULL REFERENCES subdomains(subdomain_id),
    expert_id    TEXT NOT NULL,
    PRIMARY KEY (subdomain_id, expert_id)
);

CREATE TABLE IF NOT EXISTS questions (
    question_id         TEXT PRIMARY KEY,
    original_text       TEXT NOT NULL,
    status              TEXT NOT NULL,
    priority            TEXT NOT NULL DEFAULT 'normal',
    category            TEXT,
    subdomain_id        TEXT REFERENCES subdomains(subdomain_id),
    routing_origin      TEXT NOT NULL,   -- JSON-encoded RouteOrigin
    asked_by            TEXT NOT NULL,
    assigned_to         TEXT,
    created_at          TEXT NOT NULL,   -- ISO 8601 UTC; engine-assigned
    routed_at           TEXT NOT NULL,   -- start of the current SLA window
    first_response_at   TEXT,
    resolved_at         TEXT,
    satisfaction_rating INTEGER,         -- 1..5, write-once
    gap_analysis        TEXT NOT NULL DEFAULT '{}',  -- JSON
    version             INTEGER NOT NULL DEFAULT 0   -- optimistic lock
);

-- Answers are strictly append-only; no UPDATE or DELETE is ever issued.
CREATE TABLE IF NOT EXISTS answers (
    answer_id    TEXT PRIMARY KEY,
    question_id  TEXT NOT NULL REFERENCES questions(question_id),
    content      TEXT NOT NULL,
    source       TEXT NOT NULL,
    created_by   TEXT NOT NULL,
    delivered_at TEXT NOT NULL
);

-- Expiry is two columns; exactly one governs (enforced by the CHECK and by
-- the Lifetime sum type above the store).
CREATE TABLE IF NOT EXISTS wisdom_facts (
    fact_id            TEXT PRIMARY KEY,
    content            TEXT NOT NULL,
    tier               TEXT NOT NULL,
    confidence_score   REAL NOT NULL,
    importance         INTEGER NOT NULL,
    good_until         TEXT,
    is_perpetual       INTEGER NOT NULL,
    usage_count        INTEGER NOT NULL DEFAULT 0,
    last_used_at       TEXT,
    source_answer_id   TEXT,
    source_document_id TEXT,
    created_at         TEXT NOT NULL,
    CHECK ((is_perpetual = 1) = (good_until IS NULL))
);

CREATE TABLE IF NOT EXISTS documents (
    document_id           TEXT PRIMARY KEY,
    title                 TEXT NOT NULL,
    content               TEXT NOT NULL,
    parsed_text           TEXT,
    parsing_status        TEXT NOT NULL DEFAULT 'pending',
    extraction_status     TEXT NOT NULL DEFAULT 'pending',
    extracted_facts_count INTEGER NOT NULL DEFAULT 0,
    validated_facts_count INTEGER NOT NULL DEFAULT 0,
    good_until            TEXT,
    is_perpetual          INTEGER NOT NULL,
    auto_delete_on_expiry INTEGER NOT NULL DEFAULT 0,
    uploaded_by           TEXT NOT NULL,
    created_at            TEXT NOT NULL,
    CHECK ((is_perpetual = 1) = (good_until IS NULL))
);

CREATE TABLE IF NOT EXISTS candidates (
    candidate_id          TEXT PRIMARY KEY,
    document_id           TEXT NOT NULL REFERENCES documents(document_id)
                          ON DELETE CASCADE,
    fact_text             TEXT NOT NULL,
    extraction_confidence REAL NOT NULL,
    validation_status     TEXT NOT NULL DEFAULT 'pending',
    rejection_reason      TEXT,
    created_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS automation_rules (
    rule_id         TEXT PRIMARY KEY,
    trigger_text    TEXT NOT NULL,
    answer_text     TEXT NOT NULL,
    enabled         INTEGER NOT NULL DEFAULT 1,
    times_triggered INTEGER NOT NULL DEFAULT 0,
    times_accepted  INTEGER NOT NULL DEFAULT 0,
    times_rejected  INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reassignment_requests (
    request_id             TEXT PRIMARY KEY,
    question_id            TEXT NOT NULL REFERENCES questions(question_id),
    requested_by           TEXT NOT NULL,
    current_subdomain_id   TEXT,
    suggested_subdomain_id TEXT NOT NULL REFERENCES subdomains(subdomain_id),
    reason                 TEXT NOT NULL,
    status                 TEXT NOT NULL DEFAULT 'pending',
    reviewed_by            TEXT,
    admin_notes            TEXT,
    created_at             TEXT NOT NULL,
    reviewed_at            TEXT
);

-- One row per (question, SLA window); the UNIQUE constraint is what makes
-- escalation exactly-once per breach window.
CREATE TABLE IF NOT EXISTS escalations (
    escalation_id TEXT PRIMARY KEY,
    question_id   TEXT NOT NULL REFERENCES questions(question_id),
    window_start  TEXT NOT NULL,
    emitted_at    TEXT NOT NULL,
    UNIQUE (question_id, window_start)
);

CREATE INDEX IF NOT EXISTS questions_status_idx    ON questions(status);
CREATE INDEX IF NOT EXISTS questions_subdomain_idx ON questions(subdomain_id);
CREATE INDEX IF NOT EXISTS answers_question_idx    ON answers(question_id);
CREATE INDEX IF NOT EXISTS facts_tier_idx          ON wisdom_facts(tier);
CREATE INDEX IF NOT EXISTS candidates_document_idx ON candidates(document_id);
CREATE INDEX IF NOT EXISTS reassignment_question_idx
    ON reassignment_requests(question_id);

PRAGMA user_version = 1;
";

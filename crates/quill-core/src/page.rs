//! Pagination envelope shared by every list endpoint.

use serde::{Deserialize, Serialize};

const MAX_PAGE_SIZE: u32 = 200;

/// 1-based page request. Out-of-range values are normalised, not rejected.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
  #[serde(default = "default_page")]
  pub page:      u32,
  #[serde(default = "default_page_size")]
  pub page_size: u32,
}

fn default_page() -> u32 { 1 }
fn default_page_size() -> u32 { 25 }

impl Default for PageRequest {
  fn default() -> Self {
    Self { page: default_page(), page_size: default_page_size() }
  }
}

impl PageRequest {
  pub fn limit(&self) -> u32 { self.page_size.clamp(1, MAX_PAGE_SIZE) }

  pub fn offset(&self) -> u64 {
    u64::from(self.page.max(1) - 1) * u64::from(self.limit())
  }
}

/// Every list endpoint returns items plus total/page/page_size.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub items:     Vec<T>,
  pub total:     u64,
  pub page:      u32,
  pub page_size: u32,
}

impl<T> Page<T> {
  pub fn new(items: Vec<T>, total: u64, request: &PageRequest) -> Self {
    Self {
      items,
      total,
      page: request.page.max(1),
      page_size: request.limit(),
    }
  }
}

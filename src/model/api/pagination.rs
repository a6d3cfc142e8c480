use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination query parameters. Pages are numbered from 1.
#[derive(Debug, Clone, Copy, FromForm, UriDisplayQuery)]
pub struct PaginationRequest {
    page_num: Option<u32>,
    page_size: Option<u32>,
}

impl PaginationRequest {
    pub fn new(page_num: u32, page_size: u32) -> Self {
        Self {
            page_num: Some(page_num),
            page_size: Some(page_size),
        }
    }

    pub fn page_num(&self) -> u32 {
        self.page_num.unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Reject page zero and page sizes outside `1..=MAX_PAGE_SIZE`.
    pub fn validate(&self) -> Result<()> {
        if self.page_num() == 0 {
            return Err(Error::bad_request("Pages are numbered from 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size()) {
            return Err(Error::bad_request(format!(
                "Page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// How many items precede this page.
    pub fn skip(&self) -> u64 {
        u64::from(self.page_num().saturating_sub(1)) * u64::from(self.page_size())
    }

    /// Wrap one page of items.
    pub fn to_paginated<T>(self, total: u64, items: Vec<T>) -> Paginated<T> {
        Paginated {
            items,
            pagination: PaginationResult {
                page_num: self.page_num(),
                page_size: self.page_size(),
                total,
            },
        }
    }
}

/// Where a page sits in the whole result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page_num: u32,
    pub page_size: u32,
    pub total: u64,
}

/// One page of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}

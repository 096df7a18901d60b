//! Query-string parameters shared by list endpoints.

use serde::Deserialize;

use crate::repositories::ListOptions;

/// `?page=2&pageSize=20`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListQuery {
    pub const DEFAULT_PAGE_SIZE: i64 = 10;

    pub fn options(&self) -> ListOptions {
        ListOptions::page(
            self.page.unwrap_or(1),
            self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE),
        )
    }
}

//! Query Builder pagination operations

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// Add pagination (LIMIT + OFFSET); pages start at 1
    pub fn paginate(mut self, per_page: u64, page: u64) -> Self {
        self.limit_count = Some(per_page);
        self.offset_value = Some(page.saturating_sub(1) * per_page);
        self
    }
}

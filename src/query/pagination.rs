use super::{LIMIT_QK, OFFSET_QK};
use std::collections::HashMap;

pub const DEFAULT_PAGINATION_LIMIT: u32 = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            limit: DEFAULT_PAGINATION_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Unparseable or non-positive limit falls back to the default; limits above `max_limit` are clamped.
    /// Unparseable or negative offset becomes 0.
    pub fn parse(limit: Option<&str>, offset: Option<&str>, max_limit: u32) -> Self {
        let limit = limit
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n >= 1)
            .map(|n| n.min(max_limit as i64) as u32)
            .unwrap_or(DEFAULT_PAGINATION_LIMIT.min(max_limit));
        let offset = offset
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n >= 0)
            .map(|n| n as u64)
            .unwrap_or(0);
        Pagination { limit, offset }
    }

    pub fn from_query(q: &HashMap<String, String>, max_limit: u32) -> Self {
        Self::parse(
            q.get(LIMIT_QK).map(String::as_str),
            q.get(OFFSET_QK).map(String::as_str),
            max_limit,
        )
    }

    pub fn render(&self) -> String {
        format!("LIMIT {} OFFSET {}", self.limit, self.offset)
    }
}

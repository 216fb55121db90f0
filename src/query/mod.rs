//! Request parameter model: parsed from loosely-typed query strings, validated against a `Table` only at render time.

mod filters;
mod pagination;
mod row;
mod select;
mod sorting;

pub use filters::*;
pub use pagination::*;
pub use row::*;
pub use select::*;
pub use sorting::*;

use std::collections::HashMap;

pub const SELECT_COLUMNS_QK: &str = "selectCols";
pub const TEXT_FILTERS_QK: &str = "textFilters";
pub const TEXT_FILTERS_COLS_QK: &str = "textFiltersCols";
pub const FILTERS_QK: &str = "filters";
pub const FILTERS_ARGS_QK: &str = "filtersArgs";
pub const OFFSET_QK: &str = "offset";
pub const LIMIT_QK: &str = "limit";
pub const SORT_QK: &str = "sort";

pub const QUERY_ARGS_DELIMITER: char = '|';

/// Split a pipe-delimited query value, dropping empty segments.
pub(crate) fn split_delimited(raw: &str) -> Vec<String> {
    raw.split(QUERY_ARGS_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Clone, Debug, Default)]
pub struct GetRowsParams {
    pub select_columns: SelectColumns,
    pub filters: Filters,
    pub pagination: Pagination,
    pub sorting: Sorting,
}

impl GetRowsParams {
    pub fn from_query(q: &HashMap<String, String>, max_limit: u32) -> Self {
        GetRowsParams {
            select_columns: SelectColumns::from_query(q),
            filters: Filters::from_query(q),
            pagination: Pagination::from_query(q, max_limit),
            sorting: Sorting::from_query(q),
        }
    }
}

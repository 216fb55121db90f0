use super::{split_delimited, SELECT_COLUMNS_QK};
use crate::schema::{Column, Table};
use std::collections::HashMap;

/// Optional column allowlist; empty means all columns.
#[derive(Clone, Debug, Default)]
pub struct SelectColumns(pub Vec<String>);

impl SelectColumns {
    pub fn from_query(q: &HashMap<String, String>) -> Self {
        SelectColumns(q.get(SELECT_COLUMNS_QK).map(|raw| split_delimited(raw)).unwrap_or_default())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Known requested columns, or every column when none survive.
    pub fn resolve<'t>(&self, table: &'t Table) -> Vec<&'t Column> {
        let cols = table.columns_by_names(&self.0);
        if cols.is_empty() {
            table.columns.iter().collect()
        } else {
            cols
        }
    }

    pub fn render(&self, table: &Table) -> String {
        self.resolve(table)
            .iter()
            .map(|c| c.safe_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

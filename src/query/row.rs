//! Row payloads for insert/update.

use crate::schema::{Column, Table};
use crate::sql::PgBindValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client-supplied column assignments. Unknown keys are dropped, not rejected.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(pub Map<String, Value>);

/// A payload entry that survived schema validation, with its bind position.
#[derive(Clone, Debug)]
pub struct BoundColumn<'t> {
    pub column: &'t Column,
    pub value: PgBindValue,
    pub position: usize,
}

impl BoundColumn<'_> {
    pub fn placeholder(&self) -> String {
        self.column.cast_placeholder(self.position)
    }
}

impl RawRow {
    /// Keep only entries naming a column of `table`; positions start after `params_offset`.
    pub fn bind_columns<'t>(&self, table: &'t Table, params_offset: usize) -> Vec<BoundColumn<'t>> {
        self.0
            .iter()
            .filter_map(|(name, value)| table.column(name).map(|c| (c, value)))
            .enumerate()
            .map(|(i, (column, value))| BoundColumn {
                column,
                value: PgBindValue::from_json(value, &column.reg_type),
                position: params_offset + i + 1,
            })
            .collect()
    }
}

impl From<Map<String, Value>> for RawRow {
    fn from(m: Map<String, Value>) -> Self {
        RawRow(m)
    }
}

//! In-memory table model built from the catalog. Immutable once published.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Quote identifier for PostgreSQL. Only ever called on names taken from the schema model.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Target of a foreign key constraint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyInfo {
    pub table_name: String,
    pub column_name: String,
    pub constraint_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub oid: i32,
    /// Canonical type name as rendered by `regtype` (e.g. "integer", "text[]"). Used for casts.
    pub reg_type: String,
    pub udt_name: String,
    /// Drives the default text search.
    pub is_text: bool,
    pub is_nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub is_primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyInfo>,
}

impl Column {
    pub fn safe_name(&self) -> String {
        quoted(&self.name)
    }

    /// Placeholder for a text-bound value converted to this column's type, e.g. `$3::text::integer`.
    pub fn cast_placeholder(&self, n: usize) -> String {
        match self.reg_type.as_str() {
            "" | "text" => format!("${}::text", n),
            ty => format!("${}::text::{}", n, ty),
        }
    }

    pub fn references(&self, table: &str) -> bool {
        self.foreign_key.as_ref().map(|fk| fk.table_name == table).unwrap_or(false)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub schema: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            schema: schema.into(),
            columns: Vec::new(),
        }
    }

    /// Fully qualified, quoted table name.
    pub fn safe_name(&self) -> String {
        format!("{}.{}", quoted(&self.schema), quoted(&self.name))
    }

    pub fn safe_column_names(&self) -> Vec<String> {
        self.columns.iter().map(Column::safe_name).collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Known columns in request order; unknown names are dropped.
    pub fn columns_by_names<S: AsRef<str>>(&self, names: &[S]) -> Vec<&Column> {
        names.iter().filter_map(|n| self.column(n.as_ref())).collect()
    }

    pub fn text_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_text).collect()
    }

    pub fn text_column_names(&self) -> Vec<String> {
        self.text_columns().into_iter().map(|c| c.name.clone()).collect()
    }

    /// First primary key column in ordinal order.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    pub fn foreign_key_column_to(&self, table: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.references(table))
    }

    pub fn foreign_key_columns_to(&self, table: &str) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.references(table)).collect()
    }
}

/// Table name to table. Built wholesale on load and never mutated afterwards.
pub type TablesMap = BTreeMap<String, Table>;


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quoted("name"), "\"name\"");
        assert_eq!(quoted("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(users().safe_name(), "\"public\".\"users\"");
    }

    #[test]
    fn lookups() {
        let t = users();
        assert!(t.column("age").is_some());
        assert!(t.column("missing").is_none());
        let picked: Vec<&str> = t
            .columns_by_names(&["age", "nope", "id"])
            .into_iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(picked, vec!["age", "id"]);
        assert_eq!(t.text_column_names(), vec!["name"]);
        assert_eq!(t.primary_key().map(|c| c.name.as_str()), Some("id"));
    }

    #[test]
    fn foreign_key_lookup_in_ordinal_order() {
        let t = table(
            "friends",
            vec![
                fk("user_id", "integer", "users", "id"),
                fk("friend_id", "integer", "users", "id"),
                fk("tag_id", "integer", "tags", "id"),
            ],
        );
        assert_eq!(t.foreign_key_column_to("users").map(|c| c.name.as_str()), Some("user_id"));
        assert_eq!(t.foreign_key_columns_to("users").len(), 2);
        assert!(t.foreign_key_column_to("posts").is_none());
    }

    #[test]
    fn cast_placeholder_uses_reg_type() {
        assert_eq!(col("age", "integer").cast_placeholder(2), "$2::text::integer");
        assert_eq!(col("nums", "integer[]").cast_placeholder(3), "$3::text::integer[]");
        assert_eq!(col("bio", "text").cast_placeholder(1), "$1::text");
        assert_eq!(col("x", "").cast_placeholder(1), "$1::text");
    }
}

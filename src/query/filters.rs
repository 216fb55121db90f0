//! Filters: either an opaque SQL boolean expression with positional args, or a text search.

use super::{split_delimited, FILTERS_ARGS_QK, FILTERS_QK, TEXT_FILTERS_COLS_QK, TEXT_FILTERS_QK};
use crate::schema::Table;
use crate::sql::PgBindValue;
use std::collections::HashMap;

/// Rendered WHERE clause; `sql` is empty when there is nothing to filter on.
#[derive(Clone, Debug, Default)]
pub struct WhereClause {
    pub sql: String,
    pub args: Vec<PgBindValue>,
    /// Leading args whose type PostgreSQL has to infer from the caller's expression.
    pub inferred_params: usize,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Caller-supplied SQL expression. Passed through as-is: the expression text is trusted,
/// only its arguments are bound.
#[derive(Clone, Debug, Default)]
pub struct SqlFilter {
    pub statement: String,
    pub args: Vec<String>,
}

impl SqlFilter {
    pub fn parse(statement: &str, raw_args: &str) -> Self {
        let args = if raw_args.is_empty() {
            Vec::new()
        } else {
            raw_args.split(super::QUERY_ARGS_DELIMITER).map(String::from).collect()
        };
        SqlFilter {
            statement: statement.to_string(),
            args,
        }
    }

    pub fn render(&self, _table: &Table) -> WhereClause {
        if self.statement.trim().is_empty() {
            return WhereClause::default();
        }
        WhereClause {
            sql: format!("WHERE {}", self.statement),
            args: self.args.iter().map(|a| PgBindValue::from_query_arg(a)).collect(),
            inferred_params: self.args.len(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TextSearchFilter {
    pub text: String,
    /// Explicit column subset; empty means every text-classified column.
    pub columns: Vec<String>,
}

impl TextSearchFilter {
    pub fn render(&self, table: &Table) -> WhereClause {
        let cols = if self.columns.is_empty() {
            table.text_columns()
        } else {
            table.columns_by_names(&self.columns)
        };
        if cols.is_empty() {
            // Nothing searchable: match no rows rather than everything.
            return WhereClause {
                sql: "WHERE FALSE".into(),
                ..Default::default()
            };
        }
        let exprs: Vec<String> = cols
            .iter()
            .map(|c| format!("{}::text ILIKE $1", c.safe_name()))
            .collect();
        WhereClause {
            sql: format!("WHERE {}", exprs.join(" OR ")),
            args: vec![PgBindValue::text(format!("%{}%", self.text.to_lowercase()))],
            inferred_params: 0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub enum Filters {
    #[default]
    None,
    Sql(SqlFilter),
    TextSearch(TextSearchFilter),
}

impl Filters {
    /// A non-empty `textFilters` takes precedence over `filters`.
    pub fn from_query(q: &HashMap<String, String>) -> Self {
        if let Some(text) = q.get(TEXT_FILTERS_QK).filter(|t| !t.is_empty()) {
            let columns = q
                .get(TEXT_FILTERS_COLS_QK)
                .map(|raw| split_delimited(raw))
                .unwrap_or_default();
            return Filters::TextSearch(TextSearchFilter {
                text: text.clone(),
                columns,
            });
        }
        match q.get(FILTERS_QK).filter(|s| !s.trim().is_empty()) {
            Some(statement) => {
                let raw_args = q.get(FILTERS_ARGS_QK).map(String::as_str).unwrap_or("");
                Filters::Sql(SqlFilter::parse(statement, raw_args))
            }
            None => Filters::None,
        }
    }

    pub fn render(&self, table: &Table) -> WhereClause {
        match self {
            Filters::None => WhereClause::default(),
            Filters::Sql(f) => f.render(table),
            Filters::TextSearch(f) => f.render(table),
        }
    }

    /// Restrict a text search to `columns` unless the caller already named some.
    pub fn with_default_text_columns(mut self, columns: &[String]) -> Self {
        if let Filters::TextSearch(ref mut f) = self {
            if f.columns.is_empty() {
                f.columns = columns.to_vec();
            }
        }
        self
    }
}

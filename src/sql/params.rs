//! Values bound to PostgreSQL statements, built from JSON payloads or raw query-string args.
//!
//! Every value travels as text and the statement decides its type: write paths cast
//! `$n::text::<column type>`, caller filter args are cast to the type PostgreSQL infers for
//! them (see `cast_placeholders`). PostgreSQL's own input functions do the conversion, so a
//! value such as `"007"` reaches a text column unchanged.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    pub fn text(s: impl Into<String>) -> Self {
        PgBindValue::Text(s.into())
    }

    /// Render a JSON payload value as input text for a column of `reg_type`.
    /// JSON arrays become array literals for array columns and JSON text otherwise.
    pub fn from_json(v: &Value, reg_type: &str) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Array(items) if reg_type.ends_with("[]") => PgBindValue::Text(array_literal(items)),
            other => PgBindValue::Text(other.to_string()),
        }
    }

    /// Query-string args are passed through verbatim; the statement gives them their type.
    pub fn from_query_arg(s: &str) -> Self {
        PgBindValue::Text(s.to_string())
    }
}

/// `[1, "a b", null, [2]]` to `{1,"a b",NULL,{2}}`. Strings are always quoted so `"NULL"`
/// stays a string.
pub fn array_literal(items: &[Value]) -> String {
    let elems: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Array(inner) => array_literal(inner),
            Value::String(s) => quote_array_element(s),
            Value::Object(_) => quote_array_element(&item.to_string()),
            Value::Bool(_) | Value::Number(_) => item.to_string(),
        })
        .collect();
    format!("{{{}}}", elems.join(","))
}

fn quote_array_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}

//! Administrative escape hatch: run arbitrary SQL with positional args. No schema validation.

use crate::error::AppError;
use crate::sql::PgBindValue;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::postgres::{PgRow, PgValueFormat, PgValueRef};
use sqlx::{Column, Either, Executor, PgPool, Row, TypeInfo, ValueRef};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::crud::cast_inferred_params;

/// At most this many rows are returned; the rest of the result set is read and discarded.
pub const SQL_ROWS_LIMIT: usize = 500;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SqlExecutionRequest {
    pub query: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlExecutionResponse {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub rows_affected: u64,
}

pub struct SqlExecutionService;

impl SqlExecutionService {
    pub async fn execute(pool: &PgPool, req: &SqlExecutionRequest) -> Result<SqlExecutionResponse, AppError> {
        let sql = req.query.trim();
        if sql.is_empty() {
            return Err(AppError::BadRequest("query is empty".into()));
        }
        let args: Vec<PgBindValue> = req.args.iter().map(|v| PgBindValue::from_json(v, "")).collect();
        let sql = cast_inferred_params(pool, sql, args.len()).await?;
        tracing::debug!(sql = %sql, params = ?args, "sql execute");

        let mut query = sqlx::query(&sql);
        for a in args {
            query = query.bind(a);
        }

        let mut out = SqlExecutionResponse::default();
        let mut stream = pool.fetch_many(query);
        while let Some(step) = stream.try_next().await? {
            match step {
                Either::Left(done) => out.rows_affected += done.rows_affected(),
                Either::Right(row) => {
                    if out.columns.is_empty() {
                        out.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    if out.rows.len() < SQL_ROWS_LIMIT {
                        out.rows.push(row_to_map(&row));
                    }
                }
            }
        }
        drop(stream);

        if out.columns.is_empty() {
            // No rows came back; a SELECT still has a shape worth reporting.
            if let Ok(described) = pool.describe(&sql).await {
                out.columns = described.columns().iter().map(|c| c.name().to_string()).collect();
            }
        }
        Ok(out)
    }
}

fn row_to_map(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|c| (c.name().to_string(), cell_to_value(row, c.ordinal())))
        .collect()
}

/// Decode by declared column type. Text-format cells are taken as text; binary cells without a
/// dedicated decoder fall back to their UTF-8 bytes.
fn cell_to_value(row: &PgRow, idx: usize) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => raw,
        _ => return Value::Null,
    };
    let type_name = row.column(idx).type_info().name().to_string();
    if raw.format() == PgValueFormat::Text {
        return raw.as_str().map(|s| text_cell(&type_name, s)).unwrap_or(Value::Null);
    }
    let decoded: Result<Option<Value>, sqlx::Error> = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Value::Bool)),
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT4" => row.try_get::<Option<f32>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT8" => row.try_get::<Option<f64>, _>(idx).map(|v| v.map(Value::from)),
        "NUMERIC" => Ok(raw
            .as_bytes()
            .ok()
            .and_then(numeric_to_string)
            .map(|s| number_or_string(&s))),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .map(|v| v.map(|t| Value::String(t.format("%H:%M:%S%.f").to_string()))),
        "INTERVAL" => row
            .try_get::<Option<sqlx::postgres::types::PgInterval>, _>(idx)
            .map(|v| v.map(|i| Value::String(format!("P{}M{}DT{}S", i.months, i.days, micros_to_seconds(i.microseconds))))),
        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .map(|v| v.map(|b| Value::String(format!("\\x{}", hex(&b))))),
        "INET" | "CIDR" => Ok(raw.as_bytes().ok().and_then(inet_to_string).map(Value::String)),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx),
        "INT2[]" => row.try_get::<Option<Vec<Option<i16>>>, _>(idx).map(|v| v.map(array_value)),
        "INT4[]" => row.try_get::<Option<Vec<Option<i32>>>, _>(idx).map(|v| v.map(array_value)),
        "INT8[]" => row.try_get::<Option<Vec<Option<i64>>>, _>(idx).map(|v| v.map(array_value)),
        "FLOAT4[]" => row.try_get::<Option<Vec<Option<f32>>>, _>(idx).map(|v| v.map(array_value)),
        "FLOAT8[]" => row.try_get::<Option<Vec<Option<f64>>>, _>(idx).map(|v| v.map(array_value)),
        "BOOL[]" => row.try_get::<Option<Vec<Option<bool>>>, _>(idx).map(|v| v.map(array_value)),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => {
            row.try_get::<Option<Vec<Option<String>>>, _>(idx).map(|v| v.map(array_value))
        }
        "UUID[]" => row
            .try_get::<Option<Vec<Option<uuid::Uuid>>>, _>(idx)
            .map(|v| v.map(|items| array_value(items.into_iter().map(|u| u.map(|u| u.to_string())).collect()))),
        _ => Ok(utf8_cell(&raw)),
    };
    match decoded {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::debug!(column = idx, type_name = %type_name, error = %e, "undecodable cell");
            utf8_cell(&raw).unwrap_or(Value::Null)
        }
    }
}

/// Text-format cell: numbers and booleans become JSON scalars, json stays structured.
fn text_cell(type_name: &str, s: &str) -> Value {
    match type_name {
        "INT2" | "INT4" | "INT8" | "FLOAT4" | "FLOAT8" | "NUMERIC" => number_or_string(s),
        "BOOL" => Value::Bool(s == "t"),
        "JSON" | "JSONB" => serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())),
        _ => Value::String(s.to_string()),
    }
}

fn utf8_cell(raw: &PgValueRef<'_>) -> Option<Value> {
    let bytes = raw.as_bytes().ok()?;
    std::str::from_utf8(bytes).ok().map(|s| Value::String(s.to_string()))
}

fn number_or_string(s: &str) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(s.to_string()),
    }
}

fn array_value<T: Into<Value>>(items: Vec<Option<T>>) -> Value {
    Value::Array(items.into_iter().map(|v| v.map(Into::into).unwrap_or(Value::Null)).collect())
}

fn micros_to_seconds(micros: i64) -> String {
    let sign = if micros < 0 { "-" } else { "" };
    let abs = micros.unsigned_abs();
    let (secs, frac) = (abs / 1_000_000, abs % 1_000_000);
    if frac == 0 {
        format!("{}{}", sign, secs)
    } else {
        format!("{}{}.{:06}", sign, secs, frac).trim_end_matches('0').to_string()
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// NUMERIC binary format: ndigits, weight, sign, dscale, then base-10000 digits, all big-endian i16.
fn numeric_to_string(bytes: &[u8]) -> Option<String> {
    let word = |i: usize| -> Option<i16> {
        let b = bytes.get(i * 2..i * 2 + 2)?;
        Some(i16::from_be_bytes([b[0], b[1]]))
    };
    let ndigits = usize::try_from(word(0)?).ok()?;
    let weight = i32::from(word(1)?);
    let sign = word(2)? as u16;
    let dscale = usize::from(word(3)? as u16);
    match sign {
        0xC000 => return Some("NaN".into()),
        0xD000 => return Some("Infinity".into()),
        0xF000 => return Some("-Infinity".into()),
        _ => {}
    }
    let digits: Vec<i16> = (0..ndigits).map(|i| word(4 + i)).collect::<Option<_>>()?;
    let digit_at = |pos: i32| -> i16 {
        usize::try_from(pos).ok().and_then(|p| digits.get(p).copied()).unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit_at(0).to_string());
        for pos in 1..=weight {
            out.push_str(&format!("{:04}", digit_at(pos)));
        }
    }
    if dscale > 0 {
        let mut frac = String::new();
        let mut pos = weight + 1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit_at(pos)));
            pos += 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Some(out)
}

/// INET/CIDR binary format: family, bits, is_cidr, address length, address bytes.
fn inet_to_string(bytes: &[u8]) -> Option<String> {
    let (family, bits, is_cidr, addr) = (*bytes.first()?, *bytes.get(1)?, *bytes.get(2)?, bytes.get(4..)?);
    let (ip, full) = match (family, addr.len()) {
        (2, 4) => (IpAddr::V4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3])), 32),
        (3, 16) => {
            let octets: [u8; 16] = addr.try_into().ok()?;
            (IpAddr::V6(Ipv6Addr::from(octets)), 128)
        }
        _ => return None,
    };
    Some(if bits == full && is_cidr == 0 {
        ip.to_string()
    } else {
        format!("{}/{}", ip, bits)
    })
}

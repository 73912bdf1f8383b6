//! PostgreSQL cell decoding.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::types::Oid;
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

use sqlgauge_core::{ResultRow, Value};

/// Decode every column of a row by its PostgreSQL type name.
///
/// Types without a sensible gauge or label form decode to [`Value::Null`].
pub fn decode_row(row: &PgRow) -> ResultRow {
    row.columns()
        .iter()
        .map(|column| {
            let type_name = column.type_info().name();
            decode_cell(row, column.ordinal(), type_name).unwrap_or_else(|e| {
                tracing::debug!(
                    column = column.name(),
                    type_name,
                    error = %e,
                    "failed to decode column"
                );
                Value::Null
            })
        })
        .collect()
}

fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let value = match type_name {
        "BOOL" => Value::from(row.try_get::<Option<bool>, _>(idx)?),
        "INT2" => row
            .try_get::<Option<i16>, _>(idx)?
            .map(|v| Value::Int(i64::from(v)))
            .unwrap_or(Value::Null),
        "INT4" => Value::from(row.try_get::<Option<i32>, _>(idx)?),
        "INT8" => Value::from(row.try_get::<Option<i64>, _>(idx)?),
        "OID" => row
            .try_get::<Option<Oid>, _>(idx)?
            .map(|oid| Value::Int(i64::from(oid.0)))
            .unwrap_or(Value::Null),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)?
            .map(|v| Value::Float(f64::from(v)))
            .unwrap_or(Value::Null),
        "FLOAT8" => Value::from(row.try_get::<Option<f64>, _>(idx)?),
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)?
            .and_then(|d| d.to_f64())
            .map(Value::Float)
            .unwrap_or(Value::Null),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            Value::from(row.try_get::<Option<String>, _>(idx)?)
        }
        _ => {
            tracing::debug!(type_name, "unsupported column type");
            Value::Null
        }
    };
    Ok(value)
}

//! Row decoding into JSON maps.
//!
//! Statement results are fully buffered, so every row is decoded once into a
//! `serde_json::Map` keyed by column name. Column types are first classified
//! into a [`TypeCategory`], then decoded with the Rust type that category
//! maps to for the given driver.

use crate::models::{ColumnMetadata, DatabaseType};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    DateTime,
    Date,
    Time,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    // "interval" contains "int" but is not an integer
    if lower != "interval"
        && (lower.contains("int") || lower.contains("serial") || lower.contains("tiny"))
    {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return if db == DatabaseType::SQLite {
            TypeCategory::Text
        } else {
            TypeCategory::Json
        };
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // SQLite stores dates as text
    if db != DatabaseType::SQLite {
        match lower.as_str() {
            "datetime" | "timestamp" | "timestamptz" => return TypeCategory::DateTime,
            "date" => return TypeCategory::Date,
            "time" => return TypeCategory::Time,
            _ => {}
        }
    }

    if lower.contains("char") || lower.contains("text") || lower == "string" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Render binary data as text when it is valid UTF-8, otherwise as base64.
pub fn binary_to_json(bytes: &[u8]) -> JsonValue {
    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Conversion of a driver row into a JSON map plus column metadata.
pub trait RowToJson {
    fn to_json_map(&self) -> Map<String, JsonValue>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

/// Decode column `idx` as `Option<T>`; `None` when the type does not fit.
fn get<R, T>(row: &R, idx: usize) -> Option<Option<T>>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: for<'r> Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok()
}

fn number_from_f64(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Decoders shared by every driver, tried in order until one fits.
fn decode_common<R>(row: &R, idx: usize, category: TypeCategory) -> Option<JsonValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    i64: for<'r> Decode<'r, R::Database> + Type<R::Database>,
    f64: for<'r> Decode<'r, R::Database> + Type<R::Database>,
    bool: for<'r> Decode<'r, R::Database> + Type<R::Database>,
    String: for<'r> Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: for<'r> Decode<'r, R::Database> + Type<R::Database>,
{
    let value = match category {
        TypeCategory::Integer => get::<R, i64>(row, idx)?.map(|v| JsonValue::Number(v.into())),
        TypeCategory::Float => get::<R, f64>(row, idx)?.map(number_from_f64),
        TypeCategory::Boolean => get::<R, bool>(row, idx)?.map(JsonValue::Bool),
        TypeCategory::Binary => get::<R, Vec<u8>>(row, idx)?.map(|v| binary_to_json(&v)),
        _ => get::<R, String>(row, idx)?.map(JsonValue::String),
    };
    Some(value.unwrap_or(JsonValue::Null))
}

fn decode_mysql(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    let specific: Option<Option<JsonValue>> = match category {
        TypeCategory::Decimal => get::<_, RawDecimal>(row, idx).map(|v| v.map(|d| d.0.into())),
        TypeCategory::Json => get::<_, JsonValue>(row, idx).map(|v| v.filter(|j| !j.is_null())),
        TypeCategory::DateTime => get::<_, chrono::NaiveDateTime>(row, idx)
            .map(|v| v.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string().into())),
        TypeCategory::Date => {
            get::<_, chrono::NaiveDate>(row, idx).map(|v| v.map(|d| d.to_string().into()))
        }
        TypeCategory::Time => {
            get::<_, chrono::NaiveTime>(row, idx).map(|v| v.map(|t| t.to_string().into()))
        }
        // BIGINT UNSIGNED does not fit in i64
        TypeCategory::Integer => decode_common(row, idx, category)
            .map(Some)
            .or_else(|| get::<_, u64>(row, idx).map(|v| v.map(|n| JsonValue::Number(n.into())))),
        _ => None,
    };
    specific
        .map(|v| v.unwrap_or(JsonValue::Null))
        .or_else(|| decode_common(row, idx, category))
        .unwrap_or_else(|| fallback(category))
}

fn decode_postgres(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
    let specific: Option<Option<JsonValue>> = match category {
        TypeCategory::Decimal => get::<_, RawDecimal>(row, idx).map(|v| v.map(|d| d.0.into())),
        TypeCategory::Json => get::<_, JsonValue>(row, idx).map(|v| v.filter(|j| !j.is_null())),
        TypeCategory::Uuid => {
            get::<_, sqlx::types::Uuid>(row, idx).map(|v| v.map(|u| u.to_string().into()))
        }
        TypeCategory::DateTime => get::<_, chrono::DateTime<chrono::Utc>>(row, idx)
            .map(|v| v.map(|d| d.to_rfc3339().into()))
            .or_else(|| {
                get::<_, chrono::NaiveDateTime>(row, idx)
                    .map(|v| v.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string().into()))
            }),
        TypeCategory::Date => {
            get::<_, chrono::NaiveDate>(row, idx).map(|v| v.map(|d| d.to_string().into()))
        }
        TypeCategory::Time => {
            get::<_, chrono::NaiveTime>(row, idx).map(|v| v.map(|t| t.to_string().into()))
        }
        // INT2/INT4 columns only decode into their own width
        TypeCategory::Integer => get::<_, i64>(row, idx)
            .or_else(|| get::<_, i32>(row, idx).map(|v| v.map(i64::from)))
            .or_else(|| get::<_, i16>(row, idx).map(|v| v.map(i64::from)))
            .map(|v| v.map(|n| JsonValue::Number(n.into()))),
        // FLOAT4 columns only decode into f32
        TypeCategory::Float => get::<_, f64>(row, idx)
            .or_else(|| get::<_, f32>(row, idx).map(|v| v.map(f64::from)))
            .map(|v| v.map(number_from_f64)),
        _ => None,
    };
    specific
        .map(|v| v.unwrap_or(JsonValue::Null))
        .or_else(|| decode_common(row, idx, category))
        .unwrap_or_else(|| fallback(category))
}

fn decode_sqlite(row: &SqliteRow, idx: usize, category: TypeCategory) -> JsonValue {
    decode_common(row, idx, category)
        .or_else(|| decode_sqlite_dynamic(row, idx))
        .unwrap_or_else(|| fallback(category))
}

/// Decode by the value's storage class; with dynamic typing a value may not
/// match its declared column type, and expression columns have none.
fn decode_sqlite_dynamic(row: &SqliteRow, idx: usize) -> Option<JsonValue> {
    let value: Option<Option<JsonValue>> = get::<_, i64>(row, idx)
        .map(|v| v.map(|n| JsonValue::Number(n.into())))
        .or_else(|| get::<_, f64>(row, idx).map(|v| v.map(number_from_f64)))
        .or_else(|| get::<_, String>(row, idx).map(|v| v.map(JsonValue::String)))
        .or_else(|| get::<_, Vec<u8>>(row, idx).map(|v| v.map(|b| binary_to_json(&b))));
    value.map(|v| v.unwrap_or(JsonValue::Null))
}

fn fallback(category: TypeCategory) -> JsonValue {
    tracing::debug!(?category, "Column value could not be decoded");
    JsonValue::Null
}

macro_rules! impl_row_to_json {
    ($row:ty, $db:expr, $decode:ident) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .map(|col| {
                        let category = categorize_type(col.type_info().name(), $db);
                        (col.name().to_string(), $decode(self, col.ordinal(), category))
                    })
                    .collect()
            }

            fn column_metadata(&self) -> Vec<ColumnMetadata> {
                self.columns()
                    .iter()
                    .map(|col| {
                        ColumnMetadata::new(
                            col.name(),
                            col.type_info().name(),
                            !col.type_info().is_null(),
                        )
                    })
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL, decode_mysql);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL, decode_postgres);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite, decode_sqlite);

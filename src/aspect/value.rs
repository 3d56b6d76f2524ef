//! Typed attribute values and their SQLite representation.

use super::metadata::AttributeType;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

/// One attribute value. The SQLite mapping is fixed: booleans as
/// INTEGER 0/1, timestamps as RFC 3339 TEXT (UTC, millisecond precision,
/// which keeps lexicographic and chronological order aligned), ids as TEXT.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Id(Uuid),
    Binary(Vec<u8>),
}

impl AttributeValue {
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            AttributeValue::Text(s) => SqlValue::Text(s.clone()),
            AttributeValue::Integer(i) => SqlValue::Integer(*i),
            AttributeValue::Real(f) => SqlValue::Real(*f),
            AttributeValue::Bool(b) => SqlValue::Integer(*b as i64),
            AttributeValue::DateTime(ts) => {
                SqlValue::Text(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            AttributeValue::Id(id) => SqlValue::Text(id.to_string()),
            AttributeValue::Binary(bytes) => SqlValue::Blob(bytes.clone()),
        }
    }

    /// Decode a stored value according to the attribute's declared type.
    /// NULL decodes to `None`; a shape that contradicts the declaration is
    /// a storage-level error.
    pub fn from_sql_value(
        value: SqlValue,
        value_type: &AttributeType,
    ) -> rusqlite::Result<Option<AttributeValue>> {
        let decoded = match (value, value_type) {
            (SqlValue::Null, _) => return Ok(None),
            (SqlValue::Text(s), AttributeType::Text { .. }) => AttributeValue::Text(s),
            (SqlValue::Integer(i), AttributeType::Integer) => AttributeValue::Integer(i),
            (SqlValue::Real(f), AttributeType::Real) => AttributeValue::Real(f),
            (SqlValue::Integer(i), AttributeType::Real) => AttributeValue::Real(i as f64),
            (SqlValue::Integer(i), AttributeType::Bool) => AttributeValue::Bool(i != 0),
            (SqlValue::Text(s), AttributeType::DateTime) => {
                let ts = DateTime::parse_from_rfc3339(&s).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                AttributeValue::DateTime(ts.with_timezone(&Utc))
            }
            (SqlValue::Text(s), AttributeType::Id) => {
                let id = Uuid::parse_str(&s).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                AttributeValue::Id(id)
            }
            (SqlValue::Blob(bytes), AttributeType::Binary) => AttributeValue::Binary(bytes),
            (other, expected) => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    format!("stored value {other:?} does not match declared type {expected:?}")
                        .into(),
                ))
            }
        };
        Ok(Some(decoded))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::DateTime(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(ts: DateTime<Utc>) -> Self {
        AttributeValue::DateTime(ts)
    }
}

//! Flat column model shared by the row, relational and columnar stores.
//!
//! Every persisted record is a fixed, ordered list of scalar columns. The
//! storage backends only ever see [`FieldValue`]s, so they stay agnostic of
//! the concrete record layout.

use thiserror::Error;

/// Storage type of a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Integer,
    Real,
}

impl ColumnType {
    /// SQL affinity used when creating relational tables
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

/// A single scalar cell
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl FieldValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            FieldValue::Text(_) => ColumnType::Text,
            FieldValue::Integer(_) => ColumnType::Integer,
            FieldValue::Real(_) => ColumnType::Real,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Real(value)
    }
}

/// Errors raised when rebuilding a record from stored cells
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("Missing column '{0}'")]
    Missing(&'static str),

    #[error("Column '{column}' expected {expected:?}, found {found:?}")]
    TypeMismatch {
        column: &'static str,
        expected: ColumnType,
        found: ColumnType,
    },

    #[error("Column '{column}' value {value} does not fit the field")]
    OutOfRange { column: &'static str, value: i64 },

    #[error("Expected {expected} columns, found {found}")]
    Arity { expected: usize, found: usize },
}

/// Conversion from a stored cell back into a typed field
pub trait FromField: Sized {
    fn from_field(value: FieldValue, column: &'static str) -> Result<Self, FieldError>;
}

impl FromField for String {
    fn from_field(value: FieldValue, column: &'static str) -> Result<Self, FieldError> {
        match value {
            FieldValue::Text(s) => Ok(s),
            other => Err(FieldError::TypeMismatch {
                column,
                expected: ColumnType::Text,
                found: other.column_type(),
            }),
        }
    }
}

impl FromField for i32 {
    fn from_field(value: FieldValue, column: &'static str) -> Result<Self, FieldError> {
        match value {
            FieldValue::Integer(v) => {
                i32::try_from(v).map_err(|_| FieldError::OutOfRange { column, value: v })
            }
            other => Err(FieldError::TypeMismatch {
                column,
                expected: ColumnType::Integer,
                found: other.column_type(),
            }),
        }
    }
}

impl FromField for f64 {
    fn from_field(value: FieldValue, column: &'static str) -> Result<Self, FieldError> {
        match value {
            FieldValue::Real(v) => Ok(v),
            // relational stores may hand back whole reals as integers
            FieldValue::Integer(v) => Ok(v as f64),
            other => Err(FieldError::TypeMismatch {
                column,
                expected: ColumnType::Real,
                found: other.column_type(),
            }),
        }
    }
}

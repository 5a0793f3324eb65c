//! Statement parameters and result rows

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use stress_core::{StoreError, StoreErrorKind, StoreResult};

/// A positional parameter or a column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// 64-bit integer
    Integer(i64),
    /// Double precision float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<ValueRef<'_>> for SqlValue {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(i) => SqlValue::Integer(i),
            ValueRef::Real(f) => SqlValue::Real(f),
            ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            SqlValue::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

/// A result row, indexable by column position
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<SqlValue>,
}

impl Row {
    /// Wrap column values
    pub fn new(values: Vec<SqlValue>) -> Self {
        Row { values }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Column value by position
    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Integer column; errors on a missing column or a different type
    pub fn get_i64(&self, index: usize) -> StoreResult<i64> {
        match self.get(index) {
            Some(SqlValue::Integer(v)) => Ok(*v),
            other => Err(StoreError::new(
                StoreErrorKind::Other,
                format!("column {} is not an integer: {:?}", index, other),
            )),
        }
    }

    /// Text column; NULL reads as `None`
    pub fn get_text(&self, index: usize) -> StoreResult<Option<&str>> {
        match self.get(index) {
            Some(SqlValue::Text(v)) => Ok(Some(v)),
            Some(SqlValue::Null) => Ok(None),
            other => Err(StoreError::new(
                StoreErrorKind::Other,
                format!("column {} is not text: {:?}", index, other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![SqlValue::Integer(1), SqlValue::from("x2"), SqlValue::Null]);
        assert_eq!(row.len(), 3);
        assert_eq!(row.get_i64(0).unwrap(), 1);
        assert_eq!(row.get_text(1).unwrap(), Some("x2"));
        assert_eq!(row.get_text(2).unwrap(), None);
    }

    #[test]
    fn test_row_type_mismatch_is_error() {
        let row = Row::new(vec![SqlValue::from("x0")]);
        assert!(row.get_i64(0).is_err());
        assert!(row.get_i64(5).is_err());
        assert!(Row::default().is_empty());
    }

    #[test]
    fn test_value_ref_conversion() {
        assert_eq!(SqlValue::from(ValueRef::Integer(4)), SqlValue::Integer(4));
        assert_eq!(SqlValue::from(ValueRef::Text(b"x1")), SqlValue::from("x1"));
        assert_eq!(SqlValue::from(ValueRef::Null), SqlValue::Null);
    }
}

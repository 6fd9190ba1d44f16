//! Column conversions shared by the repositories

use std::str::FromStr;

use libsql::Value;

use crate::error::{Error, Result};

pub fn text_or_null(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

pub fn integer_or_null(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}

pub fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

/// Parse a stored text column, reporting the column on failure
pub fn parse_column<T>(raw: &str, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|error| Error::Database(format!("invalid {column} '{raw}': {error}")))
}

pub fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;

    #[test]
    fn parse_column_reports_column_name() {
        let error = parse_column::<TaskStatus>("sideways", "status").unwrap_err();
        assert!(error.to_string().contains("invalid status 'sideways'"));
        assert_eq!(
            parse_column::<TaskStatus>("done", "status").unwrap(),
            TaskStatus::Done
        );
    }

    #[test]
    fn optional_values_become_null() {
        assert!(matches!(text_or_null(None), Value::Null));
        assert!(matches!(integer_or_null(Some(5)), Value::Integer(5)));
        assert!(matches!(flag(true), Value::Integer(1)));
    }
}

//! Binding and decoding between runtime values and SQLite storage.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use tabula_schema::SqlType;
use tabula_types::Value;
use uuid::Uuid;

use crate::error::OrmError;

/// Storage format for `Date` columns.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A borrowed [`Value`] bound as a SQL parameter.
///
/// Dates are stored as ISO `YYYY-MM-DD` text, timestamps as RFC 3339 text,
/// UUIDs as 32-character lowercase hex matching the `CHAR(32)` column type,
/// and booleans as integers.
pub struct BindValue<'a>(pub &'a Value);

impl ToSql for BindValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Stored;

        let output = match self.0 {
            Value::Null => ToSqlOutput::Owned(Stored::Null),
            Value::Int(value) => ToSqlOutput::Owned(Stored::Integer(*value)),
            Value::Float(value) => ToSqlOutput::Owned(Stored::Real(*value)),
            Value::Bool(value) => ToSqlOutput::Owned(Stored::Integer(i64::from(*value))),
            Value::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Value::Bytes(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value)),
            Value::Date(value) => {
                ToSqlOutput::Owned(Stored::Text(value.format(DATE_FORMAT).to_string()))
            }
            Value::DateTime(value) => ToSqlOutput::Owned(Stored::Text(value.to_rfc3339())),
            Value::Uuid(value) => ToSqlOutput::Owned(Stored::Text(value.simple().to_string())),
        };
        Ok(output)
    }
}

/// Decodes a stored SQLite value according to its column's mapped type.
///
/// `NULL` decodes to [`Value::Null`] regardless of the column type;
/// nullability is enforced by the schema, not here.
///
/// # Errors
///
/// Returns [`OrmError::Decode`] when the stored value does not fit the
/// mapped type, including date, timestamp, and UUID text that fails to
/// parse.
pub fn decode_value(
    column: &str,
    sql_type: &SqlType,
    stored: ValueRef<'_>,
) -> Result<Value, OrmError> {
    if let ValueRef::Null = stored {
        return Ok(Value::Null);
    }

    match sql_type {
        SqlType::Integer => match stored {
            ValueRef::Integer(value) => Ok(Value::Int(value)),
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Real => match stored {
            ValueRef::Real(value) => Ok(Value::Float(value)),
            // SQLite hands whole-number REAL values back as integers.
            ValueRef::Integer(value) => Ok(Value::Float(value as f64)),
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Boolean => match stored {
            ValueRef::Integer(value) => Ok(Value::Bool(value != 0)),
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Text => match stored {
            ValueRef::Text(bytes) => utf8_text(column, sql_type, bytes).map(Value::Text),
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Blob => match stored {
            ValueRef::Blob(bytes) => Ok(Value::Bytes(bytes.to_vec())),
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Date => match stored {
            ValueRef::Text(bytes) => {
                let text = utf8_text(column, sql_type, bytes)?;
                NaiveDate::parse_from_str(&text, DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|_| decode_error(column, sql_type, format!("{text:?}")))
            }
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Timestamp => match stored {
            ValueRef::Text(bytes) => {
                let text = utf8_text(column, sql_type, bytes)?;
                DateTime::parse_from_rfc3339(&text)
                    .map(|parsed| Value::DateTime(parsed.with_timezone(&Utc)))
                    .map_err(|_| decode_error(column, sql_type, format!("{text:?}")))
            }
            other => Err(mismatch(column, sql_type, other)),
        },
        SqlType::Guid => match stored {
            ValueRef::Text(bytes) => {
                let text = utf8_text(column, sql_type, bytes)?;
                Uuid::parse_str(&text)
                    .map(Value::Uuid)
                    .map_err(|_| decode_error(column, sql_type, format!("{text:?}")))
            }
            other => Err(mismatch(column, sql_type, other)),
        },
        // Custom column types decode by storage class alone.
        SqlType::Custom(_) => match stored {
            ValueRef::Integer(value) => Ok(Value::Int(value)),
            ValueRef::Real(value) => Ok(Value::Float(value)),
            ValueRef::Text(bytes) => utf8_text(column, sql_type, bytes).map(Value::Text),
            ValueRef::Blob(bytes) => Ok(Value::Bytes(bytes.to_vec())),
            ValueRef::Null => Ok(Value::Null),
        },
    }
}

fn utf8_text(column: &str, sql_type: &SqlType, bytes: &[u8]) -> Result<String, OrmError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| decode_error(column, sql_type, "non-utf-8 TEXT".to_string()))
}

fn decode_error(column: &str, sql_type: &SqlType, got: String) -> OrmError {
    OrmError::Decode {
        column: column.to_string(),
        expected: sql_type.ddl().to_string(),
        got,
    }
}

fn mismatch(column: &str, sql_type: &SqlType, stored: ValueRef<'_>) -> OrmError {
    decode_error(column, sql_type, storage_class(stored).to_string())
}

fn storage_class(stored: ValueRef<'_>) -> &'static str {
    match stored {
        ValueRef::Null => "NULL",
        ValueRef::Integer(_) => "INTEGER",
        ValueRef::Real(_) => "REAL",
        ValueRef::Text(_) => "TEXT",
        ValueRef::Blob(_) => "BLOB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rusqlite::Connection;

    #[test]
    fn binds_and_decodes_each_storage_format() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        conn.execute_batch(
            "CREATE TABLE sample (
                 n INTEGER, r REAL, flag BOOLEAN, s TEXT, b BLOB,
                 d DATE, ts TIMESTAMP, id CHAR(32)
             )",
        )
        .expect("should create table");

        let date = NaiveDate::from_ymd_opt(2024, 3, 9).expect("valid date");
        let stamp = Utc
            .with_ymd_and_hms(2024, 3, 9, 12, 30, 0)
            .single()
            .expect("valid timestamp");
        let id = Uuid::new_v4();
        let values = [
            Value::Int(42),
            Value::Float(2.5),
            Value::Bool(true),
            Value::Text("compline".to_string()),
            Value::Bytes(vec![1, 2, 3]),
            Value::Date(date),
            Value::DateTime(stamp),
            Value::Uuid(id),
        ];
        let binds: Vec<BindValue> = values.iter().map(BindValue).collect();
        conn.execute(
            "INSERT INTO sample VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params_from_iter(binds),
        )
        .expect("insert should succeed");

        let raw: Vec<rusqlite::types::Value> = conn
            .query_row("SELECT * FROM sample", [], |row| {
                (0..8).map(|i| row.get(i)).collect()
            })
            .expect("select should succeed");

        let types = [
            SqlType::Integer,
            SqlType::Real,
            SqlType::Boolean,
            SqlType::Text,
            SqlType::Blob,
            SqlType::Date,
            SqlType::Timestamp,
            SqlType::Guid,
        ];
        for (i, expected) in values.iter().enumerate() {
            let decoded =
                decode_value("c", &types[i], ValueRef::from(&raw[i])).expect("should decode");
            assert_eq!(&decoded, expected);
        }
    }

    #[test]
    fn uuid_is_stored_as_32_char_hex() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        conn.execute_batch("CREATE TABLE sample (id CHAR(32))")
            .expect("should create table");

        let id = Uuid::new_v4();
        let value = Value::Uuid(id);
        conn.execute("INSERT INTO sample VALUES (?1)", [BindValue(&value)])
            .expect("insert should succeed");

        let stored: String = conn
            .query_row("SELECT id FROM sample", [], |row| row.get(0))
            .expect("select should succeed");
        assert_eq!(stored.len(), 32);
        assert_eq!(stored, id.simple().to_string());
    }

    #[test]
    fn wrong_storage_class_is_a_decode_error() {
        let result = decode_value("age", &SqlType::Integer, ValueRef::Text(b"young"));
        match result {
            Err(OrmError::Decode {
                column,
                expected,
                got,
            }) => {
                assert_eq!(column, "age");
                assert_eq!(expected, "INTEGER");
                assert_eq!(got, "TEXT");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn null_decodes_to_null_for_any_type() {
        let decoded = decode_value("d", &SqlType::Date, ValueRef::Null).unwrap();
        assert_eq!(decoded, Value::Null);
    }

    #[test]
    fn integers_promote_for_real_columns() {
        let decoded = decode_value("score", &SqlType::Real, ValueRef::Integer(3)).unwrap();
        assert_eq!(decoded, Value::Float(3.0));
    }

    #[test]
    fn malformed_date_text_is_a_decode_error() {
        let result = decode_value("born", &SqlType::Date, ValueRef::Text(b"03/09/2024"));
        assert!(matches!(result, Err(OrmError::Decode { .. })));
    }

    #[test]
    fn guid_text_accepts_hyphenated_and_simple() {
        let id = Uuid::new_v4();
        for text in [id.simple().to_string(), id.to_string()] {
            let decoded =
                decode_value("id", &SqlType::Guid, ValueRef::Text(text.as_bytes())).unwrap();
            assert_eq!(decoded, Value::Uuid(id));
        }
    }

    #[test]
    fn custom_types_decode_by_storage_class() {
        let custom = SqlType::Custom("DECIMAL(10,2)".to_string());
        let real = decode_value("price", &custom, ValueRef::Real(9.75)).unwrap();
        assert_eq!(real, Value::Float(9.75));
        let text = decode_value("price", &custom, ValueRef::Text(b"9.75")).unwrap();
        assert_eq!(text, Value::Text("9.75".to_string()));
    }
}

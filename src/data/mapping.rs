//! Row mapping between SQL rows and plain data structs.
//!
//! Every mapped struct declares a static column table. Each entry names the
//! column label, its [`SqlType`] and a typed getter/setter pair, so the row
//! reader and the parameter binder are picked at compile time from the type
//! table rather than looked up by name at runtime.

use crate::data::error::{DataError, DataResult};
use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::{ToSql, ToSqlOutput, Type, Value};

/// Column kinds understood by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Long,
    Text,
    Integer,
    Short,
    Boolean,
    Double,
    Date,
}

impl SqlType {
    /// Reads `label` from `row` with the reader registered for this kind.
    pub fn read(self, row: &Row<'_>, label: &str) -> rusqlite::Result<SqlValue> {
        let value = match self {
            SqlType::Long => row.get::<_, Option<i64>>(label)?.map(SqlValue::Long),
            SqlType::Text => row.get::<_, Option<String>>(label)?.map(SqlValue::Text),
            SqlType::Integer => row.get::<_, Option<i32>>(label)?.map(SqlValue::Integer),
            SqlType::Short => row.get::<_, Option<i16>>(label)?.map(SqlValue::Short),
            SqlType::Boolean => row.get::<_, Option<bool>>(label)?.map(SqlValue::Boolean),
            SqlType::Double => row.get::<_, Option<f64>>(label)?.map(SqlValue::Double),
            SqlType::Date => row.get::<_, Option<NaiveDate>>(label)?.map(SqlValue::Date),
        };
        Ok(value.unwrap_or(SqlValue::Null))
    }
}

/// A single typed cell, either read from a row or bound as a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Long(i64),
    Text(String),
    Integer(i32),
    Short(i16),
    Boolean(bool),
    Double(f64),
    Date(NaiveDate),
}

macro_rules! typed_accessor {
    ($fn_name:ident, $kind:ident, $ty:ty) => {
        pub fn $fn_name(self, column: &'static str) -> DataResult<Option<$ty>> {
            match self {
                SqlValue::Null => Ok(None),
                SqlValue::$kind(value) => Ok(Some(value)),
                other => Err(DataError::Mapping {
                    column,
                    expected: SqlType::$kind,
                    found: other.type_name(),
                }),
            }
        }
    };
}

impl SqlValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Long(_) => "Long",
            SqlValue::Text(_) => "Text",
            SqlValue::Integer(_) => "Integer",
            SqlValue::Short(_) => "Short",
            SqlValue::Boolean(_) => "Boolean",
            SqlValue::Double(_) => "Double",
            SqlValue::Date(_) => "Date",
        }
    }

    typed_accessor!(into_long, Long, i64);
    typed_accessor!(into_text, Text, String);
    typed_accessor!(into_integer, Integer, i32);
    typed_accessor!(into_short, Short, i16);
    typed_accessor!(into_boolean, Boolean, bool);
    typed_accessor!(into_double, Double, f64);
    typed_accessor!(into_date, Date, NaiveDate);
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            SqlValue::Long(value) => value.to_sql(),
            SqlValue::Text(value) => value.to_sql(),
            SqlValue::Integer(value) => value.to_sql(),
            SqlValue::Short(value) => value.to_sql(),
            SqlValue::Boolean(value) => value.to_sql(),
            SqlValue::Double(value) => value.to_sql(),
            SqlValue::Date(value) => value.to_sql(),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Long(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<i16> for SqlValue {
    fn from(value: i16) -> Self {
        SqlValue::Short(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Boolean(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// One entry of an entity's column table.
pub struct Column<E: 'static> {
    pub name: &'static str,
    pub kind: SqlType,
    /// Store-generated key, left out of INSERT statements.
    pub primary_key: bool,
    pub get: fn(&E) -> SqlValue,
    pub set: fn(&mut E, SqlValue) -> DataResult<()>,
}

/// A struct stored as one row of `TABLE`.
pub trait Entity: Default + Sized + 'static {
    const TABLE: &'static str;

    /// Columns in declaration order.
    fn columns() -> &'static [Column<Self>];
}

/// Builds an `E` from the current row, matching columns by label.
pub fn field_mapping<E: Entity>(row: &Row<'_>) -> DataResult<E> {
    let mut instance = E::default();
    for column in E::columns() {
        let value = column
            .kind
            .read(row, column.name)
            .map_err(|e| read_error(column.name, column.kind, e))?;
        (column.set)(&mut instance, value)?;
    }
    Ok(instance)
}

/// Turns a failed typed read into a mapping error naming the column.
fn read_error(column: &'static str, expected: SqlType, err: rusqlite::Error) -> DataError {
    let found = match &err {
        rusqlite::Error::InvalidColumnName(_) => Some("missing column"),
        rusqlite::Error::InvalidColumnType(_, _, stored) => Some(stored_type_name(*stored)),
        rusqlite::Error::IntegralValueOutOfRange(..) => Some("out-of-range integer"),
        rusqlite::Error::FromSqlConversionFailure(_, stored, _) => Some(stored_type_name(*stored)),
        _ => None,
    };
    match found {
        Some(found) => DataError::Mapping {
            column,
            expected,
            found,
        },
        None => DataError::Sqlite(err),
    }
}

fn stored_type_name(stored: Type) -> &'static str {
    match stored {
        Type::Null => "NULL",
        Type::Integer => "INTEGER",
        Type::Real => "REAL",
        Type::Text => "TEXT",
        Type::Blob => "BLOB",
    }
}

fn insertable<E: Entity>() -> impl Iterator<Item = &'static Column<E>> {
    E::columns().iter().filter(|column| !column.primary_key)
}

/// `INSERT INTO <table> (..) VALUES (?1, ..)` over the non-key columns.
pub fn insert_sql<E: Entity>() -> DataResult<String> {
    let names: Vec<&str> = insertable::<E>().map(|column| column.name).collect();
    if names.is_empty() {
        return Err(DataError::NoInsertableColumns(E::TABLE));
    }
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        E::TABLE,
        names.join(", "),
        placeholders.join(", ")
    ))
}

/// Parameter values matching the placeholders of [`insert_sql`].
pub fn insert_params<E: Entity>(entity: &E) -> Vec<SqlValue> {
    insertable::<E>().map(|column| (column.get)(entity)).collect()
}

use std::{fmt::Display, str::FromStr};

use super::value::Value;
use crate::error::{DbError, Result};

/// Maximum number of bytes stored for a text value.
pub const STRING_LEN: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeId {
    Integer,
    Text,
}

impl TypeId {
    /// Serialized width in bytes. Text carries a 4 byte length prefix.
    pub fn size(&self) -> usize {
        match self {
            TypeId::Integer => 4,
            TypeId::Text => 4 + STRING_LEN,
        }
    }
}

impl FromStr for TypeId {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(TypeId::Integer),
            "string" | "text" => Ok(TypeId::Text),
            s => Err(DbError::SchemaMismatch(format!("Invalid TypeId {}", s))),
        }
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeId::Integer => write!(f, "int"),
            TypeId::Text => write!(f, "string"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDefinition {
    type_id: TypeId,
    column_name: String,
}

impl ColumnDefinition {
    pub fn new(type_id: TypeId, column_name: impl Into<String>) -> Self {
        Self {
            type_id,
            column_name: column_name.into(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnDefinition>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Result<&ColumnDefinition> {
        self.columns.get(index).ok_or_else(|| {
            DbError::SchemaMismatch(format!(
                "Column {index} out of range for {} columns",
                self.columns.len()
            ))
        })
    }

    /// Index of the first column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.column_name() == name)
    }

    /// Size in bytes of one serialized tuple.
    pub fn tuple_size(&self) -> usize {
        self.columns.iter().map(|column| column.type_id().size()).sum()
    }

    /// Two schemas are compatible if their column types line up, names are ignored.
    pub fn same_types(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.type_id() == b.type_id())
    }

    /// Checks field count, field types and text lengths against this schema.
    pub fn validate(&self, values: &[Value]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(DbError::SchemaMismatch(format!(
                "Expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        for (value, column) in values.iter().zip(self.columns.iter()) {
            if value.type_id() != column.type_id() {
                return Err(DbError::SchemaMismatch(format!(
                    "Column {} expects {}, got {}",
                    column.column_name(),
                    column.type_id(),
                    value.type_id()
                )));
            }
            if let Value::String(val) = value {
                if val.len() > STRING_LEN {
                    return Err(DbError::SchemaMismatch(format!(
                        "Value for column {} is {} bytes long, at most {STRING_LEN} fit",
                        column.column_name(),
                        val.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns = self
            .columns
            .iter()
            .map(|column| format!("{} {}", column.column_name(), column.type_id()))
            .collect::<Vec<_>>();
        write!(f, "({})", columns.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnDefinition, Schema, TypeId};
    use crate::tuple::value::Value;

    fn accounts() -> Schema {
        Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "id"),
            ColumnDefinition::new(TypeId::Text, "name"),
        ])
    }

    #[test]
    fn tuple_size_sums_column_widths() {
        assert_eq!(accounts().tuple_size(), 4 + 4 + 128);
        assert_eq!(accounts().column_index("name"), Some(1));
        assert_eq!(accounts().column_index("missing"), None);
    }

    #[test]
    fn validate_checks_count_types_and_length() {
        let schema = accounts();
        assert!(schema
            .validate(&[Value::Integer(1), Value::String("a".to_owned())])
            .is_ok());
        assert!(schema.validate(&[Value::Integer(1)]).is_err());
        assert!(schema
            .validate(&[Value::String("a".to_owned()), Value::Integer(1)])
            .is_err());
        assert!(schema
            .validate(&[Value::Integer(1), Value::String("x".repeat(129))])
            .is_err());
    }

    #[test]
    fn same_types_ignores_names() {
        let renamed = Schema::new(vec![
            ColumnDefinition::new(TypeId::Integer, "key"),
            ColumnDefinition::new(TypeId::Text, "label"),
        ]);
        assert!(accounts().same_types(&renamed));
        assert!(!accounts().same_types(&Schema::new(vec![ColumnDefinition::new(
            TypeId::Integer,
            "id"
        )])));
    }

    #[test]
    fn type_ids_parse_from_catalog_names() {
        assert_eq!("int".parse::<TypeId>().unwrap(), TypeId::Integer);
        assert_eq!("STRING".parse::<TypeId>().unwrap(), TypeId::Text);
        assert!("float".parse::<TypeId>().is_err());
    }
}

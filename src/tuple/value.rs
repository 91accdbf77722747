use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use super::schema::{TypeId, STRING_LEN};
use crate::error::{DbError, Result};

/// Comparison operators usable in a predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    /// substring match for text, equality for integers
    Like,
}

impl FromStr for Op {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Op::Equals),
            "!=" | "<>" => Ok(Op::NotEquals),
            ">" => Ok(Op::GreaterThan),
            ">=" => Ok(Op::GreaterThanOrEq),
            "<" => Ok(Op::LessThan),
            "<=" => Ok(Op::LessThanOrEq),
            "like" => Ok(Op::Like),
            s => Err(DbError::SchemaMismatch(format!("Invalid operator {s}"))),
        }
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::Like => "LIKE",
        };
        write!(f, "{op}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Integer(i32),
    String(String),
}

impl Value {
    /// Parses a value from its fixed-width serialized form.
    pub fn parse_value(bytes: &[u8], type_id: TypeId) -> Result<Self> {
        match type_id {
            TypeId::Integer => {
                let val = i32::from_be_bytes(read_array(bytes)?);
                Ok(Value::Integer(val))
            }
            TypeId::Text => {
                let len = u32::from_be_bytes(read_array(bytes)?) as usize;
                if len > STRING_LEN || bytes.len() < 4 + len {
                    return Err(DbError::Storage(format!(
                        "Corrupted string value of length {len}"
                    )));
                }
                let val = std::str::from_utf8(&bytes[4..4 + len])
                    .map_err(|e| DbError::Storage(format!("Invalid string value: {e}")))?
                    .to_owned();
                Ok(Value::String(val))
            }
        }
    }

    /// Writes the value into `buffer`, which must be at least `type_id().size()` bytes.
    /// Strings are zero padded to their full width.
    pub fn serialize_value(&self, buffer: &mut [u8]) {
        match self {
            Value::Integer(val) => buffer[..4].copy_from_slice(val.to_be_bytes().as_slice()),
            Value::String(val) => {
                let bytes = val.as_bytes();
                let len = bytes.len().min(STRING_LEN);
                buffer[..4].copy_from_slice((len as u32).to_be_bytes().as_slice());
                buffer[4..4 + len].copy_from_slice(&bytes[..len]);
                buffer[4 + len..TypeId::Text.size()].fill(0);
            }
        }
    }

    /// Converts user input into a value of the given type.
    pub fn parse(type_id: TypeId, input: &str) -> Result<Self> {
        match type_id {
            TypeId::Integer => input.trim().parse::<i32>().map(Value::Integer).map_err(|e| {
                DbError::SchemaMismatch(format!("'{input}' is not an integer: {e}"))
            }),
            TypeId::Text => Ok(Value::String(input.to_owned())),
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Integer(_) => TypeId::Integer,
            Value::String(_) => TypeId::Text,
        }
    }

    /// Applies a predicate operator. Values of different types never match.
    pub fn compare(&self, op: Op, operand: &Value) -> bool {
        if self.type_id() != operand.type_id() {
            return false;
        }
        match op {
            Op::Equals => self == operand,
            Op::NotEquals => self != operand,
            Op::GreaterThan => self.cmp(operand) == Ordering::Greater,
            Op::GreaterThanOrEq => self.cmp(operand) != Ordering::Less,
            Op::LessThan => self.cmp(operand) == Ordering::Less,
            Op::LessThanOrEq => self.cmp(operand) != Ordering::Greater,
            Op::Like => match (self, operand) {
                (Value::String(val), Value::String(pattern)) => val.contains(pattern.as_str()),
                _ => self == operand,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(val) => Some(val),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(val) => Some(*val),
            _ => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(val) => write!(f, "{val}"),
            Value::String(val) => write!(f, "{val}"),
        }
    }
}

fn read_array(bytes: &[u8]) -> Result<[u8; 4]> {
    bytes
        .get(..4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| DbError::Storage("Value truncated".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::{Op, Value};
    use crate::tuple::schema::TypeId;

    #[test]
    fn serialize_parse_test() {
        let mut buffer = [0xffu8; 4];
        Value::Integer(-42).serialize_value(&mut buffer);
        assert_eq!(
            Value::parse_value(&buffer, TypeId::Integer).unwrap(),
            Value::Integer(-42)
        );

        let mut buffer = vec![0xffu8; TypeId::Text.size()];
        Value::String("heapdb".to_owned()).serialize_value(&mut buffer);
        assert_eq!(
            Value::parse_value(&buffer, TypeId::Text).unwrap(),
            Value::String("heapdb".to_owned())
        );
        // padding is zeroed so equal strings serialize to equal bytes
        assert!(buffer[4 + 6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn corrupted_length_is_rejected() {
        let mut buffer = vec![0u8; TypeId::Text.size()];
        buffer[..4].copy_from_slice(&1000u32.to_be_bytes());
        assert!(Value::parse_value(&buffer, TypeId::Text).is_err());
    }

    #[test]
    fn compare_follows_operator() {
        let three = Value::Integer(3);
        assert!(three.compare(Op::Equals, &Value::Integer(3)));
        assert!(three.compare(Op::GreaterThan, &Value::Integer(2)));
        assert!(three.compare(Op::GreaterThanOrEq, &Value::Integer(3)));
        assert!(three.compare(Op::LessThan, &Value::Integer(4)));
        assert!(!three.compare(Op::LessThanOrEq, &Value::Integer(2)));
        assert!(three.compare(Op::NotEquals, &Value::Integer(4)));
        assert!(three.compare(Op::Like, &Value::Integer(3)));
        assert!(!three.compare(Op::Equals, &Value::String("3".to_owned())));

        let name = Value::String("alice".to_owned());
        assert!(name.compare(Op::Like, &Value::String("lic".to_owned())));
        assert!(!name.compare(Op::Like, &Value::String("bob".to_owned())));
        assert!(name.compare(Op::LessThan, &Value::String("bob".to_owned())));
    }

    #[test]
    fn parse_user_input() {
        assert_eq!(
            Value::parse(TypeId::Integer, " 17 ").unwrap(),
            Value::Integer(17)
        );
        assert!(Value::parse(TypeId::Integer, "seventeen").is_err());
        assert_eq!(
            Value::parse(TypeId::Text, "seventeen").unwrap(),
            Value::String("seventeen".to_owned())
        );
    }

    #[test]
    fn operators_parse_and_display() {
        assert_eq!("==".parse::<Op>().unwrap(), Op::Equals);
        assert_eq!("!=".parse::<Op>().unwrap(), Op::NotEquals);
        assert_eq!("LIKE".parse::<Op>().unwrap(), Op::Like);
        assert!("=>".parse::<Op>().is_err());
        for op in ["=", "<>", ">", ">=", "<", "<="] {
            assert_eq!(op.parse::<Op>().unwrap().to_string(), op);
        }
    }
}

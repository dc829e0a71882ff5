//! Runtime value type system for Cb
//!
//! `Value` is the tagged payload that flows through the interpreter, the task
//! scopes and the completion slots of async tasks. Task results are classified
//! with [`ValueKind`] (integer | floating point | text | aggregate).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type name of the synthetic error aggregate.
pub const ERROR_TYPE: &str = "Error";

/// Payload classification used when a task stores its return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueKind {
    /// No value (void return)
    Void,
    /// Integer payload (booleans are stored as integers)
    Int,
    /// Floating point payload
    Float,
    /// Text payload
    Text,
    /// Struct-like payload
    Aggregate,
}

/// Struct instance with named fields in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructValue {
    /// Struct type name (`Future`, `Error`, user types)
    pub type_name: String,
    /// Field values, ordered as declared
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
}

impl StructValue {
    /// Create an empty struct of the given type
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: Value,
    ) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field by name
    pub fn field(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get a mutable field by name
    pub fn field_mut(
        &mut self,
        name: &str,
    ) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Set a field, inserting it if missing
    pub fn set_field(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) {
        self.fields.insert(name.into(), value);
    }
}

/// Runtime value - unified representation of all Cb values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Empty value
    #[default]
    Void,

    /// Boolean
    Bool(bool),

    /// Integer
    Int(i64),

    /// Float
    Float(f64),

    /// String
    Str(String),

    /// Struct instance
    Struct(StructValue),
}

// ============================================================================
// Type Query Methods
// ============================================================================

impl Value {
    /// Classify this value as a task payload
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Bool(_) | Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Text,
            Value::Struct(_) => ValueKind::Aggregate,
        }
    }

    /// Human readable type name used in error messages
    pub fn type_name(&self) -> &str {
        match self {
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Struct(s) => &s.type_name,
        }
    }

    /// Convert to i64 (booleans widen to 0/1)
    pub fn to_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Convert to f64 (integers widen)
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to bool
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Borrow as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as struct
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Mutably borrow as struct
    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Get a struct field by name
    pub fn field(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.as_struct().and_then(|s| s.field(name))
    }

    /// Check if this is a struct of the given type
    pub fn is_struct_of(
        &self,
        type_name: &str,
    ) -> bool {
        matches!(self, Value::Struct(s) if s.type_name == type_name)
    }

    /// Check if this is the synthetic error aggregate with the given kind
    pub fn is_error_kind(
        &self,
        kind: &str,
    ) -> bool {
        self.is_struct_of(ERROR_TYPE) && self.field("kind").and_then(Value::as_str) == Some(kind)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl Value {
    /// Build a string value
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Build the synthetic error aggregate `Error { kind, message }`
    pub fn error(
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Value::Struct(
            StructValue::new(ERROR_TYPE)
                .with_field("kind", Value::Str(kind.into()))
                .with_field("message", Value::Str(message.into())),
        )
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}

// ============================================================================
// Display Implementation
// ============================================================================

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Str(s) => write!(f, "{}", s),
            Value::Struct(s) => {
                write!(
                    f,
                    "{} {{ {} }}",
                    s.type_name,
                    s.fields
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }
        }
    }
}

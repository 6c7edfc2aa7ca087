//! Message model shared by the recorder, the player and the transport

use std::fmt;

use crate::storage::FieldKind;

/// Kind of a single message value
///
/// Transports can deliver more kinds than a capture can store. Only
/// [`ValueKind::Int`], [`ValueKind::Float`] and [`ValueKind::String`] map to a
/// [`FieldKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// 32-bit signed integer
    Int,
    /// 32-bit IEEE-754 float
    Float,
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Long,
    /// 64-bit IEEE-754 float
    Double,
    /// Boolean
    Bool,
    /// Opaque byte blob
    Blob,
    /// Empty value
    Nil,
}

impl ValueKind {
    /// Field kind this value kind is stored as, if it can be stored at all
    #[must_use]
    pub fn field_kind(self) -> Option<FieldKind> {
        match self {
            Self::Int => Some(FieldKind::Int),
            Self::Float => Some(FieldKind::Float),
            Self::String => Some(FieldKind::String),
            Self::Long | Self::Double | Self::Bool | Self::Blob | Self::Nil => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Long => "Long",
            Self::Double => "Double",
            Self::Bool => "Bool",
            Self::Blob => "Blob",
            Self::Nil => "Nil",
        };
        f.write_str(name)
    }
}

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit float
    Float(f32),
    /// UTF-8 string
    String(String),
    /// 64-bit signed integer
    Long(i64),
    /// 64-bit float
    Double(f64),
    /// Boolean
    Bool(bool),
    /// Byte blob
    Blob(Vec<u8>),
    /// Empty value
    Nil,
}

impl Value {
    /// Kind of this value
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::Bool(_) => ValueKind::Bool,
            Self::Blob(_) => ValueKind::Blob,
            Self::Nil => ValueKind::Nil,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            // Keep a decimal point so the text parses back as a float
            Self::Float(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Long(v) => write!(f, "{v}L"),
            Self::Double(v) => write!(f, "{v:?}d"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Blob(v) => write!(f, "#{}", hex::encode(v)),
            Self::Nil => f.write_str("nil"),
        }
    }
}

/// An addressed list of values
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    /// Address path the message was sent to
    pub address: String,
    /// Values in positional order
    pub values: Vec<Value>,
}

impl Message {
    /// Create a message
    #[must_use]
    pub fn new(address: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            address: address.into(),
            values,
        }
    }

    /// Value kinds in positional order
    pub fn kinds(&self) -> impl Iterator<Item = ValueKind> + '_ {
        self.values.iter().map(Value::kind)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = if self.address.is_empty() {
            "/"
        } else {
            &self.address
        };
        f.write_str(address)?;
        for value in &self.values {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

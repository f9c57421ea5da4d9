//! Owned TLV values and a minimal binary encoder.
//!
//! This is not a general Ion writer. It produces exactly the subset of the
//! wire format the interpreter navigates, so fixtures, benches and fuzz
//! targets can build scratch buffers without an external encoder.

use std::fmt;

use crate::ion::{FALSE_TAG, IonType, NULL_TAG, TRUE_TAG, append_varuint};

/// An owned TLV value.
#[derive(Clone, Debug, PartialEq)]
pub enum IonValue {
    /// Untyped null (`0x0F`).
    Null,
    /// Null of a specific wire type (`T` in the high nibble, `0xF` low).
    TypedNull(IonType),
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Symbol by id.
    Symbol(u32),
    Blob(Vec<u8>),
    List(Vec<IonValue>),
    /// Fields by symbol id. Encoding sorts them ascending.
    Struct(Vec<(u32, IonValue)>),
}

fn append_header(buf: &mut Vec<u8>, ty: IonType, len: usize) {
    let code = (ty as u8) << 4;
    if len < 14 {
        #[allow(clippy::cast_possible_truncation)]
        buf.push(code | len as u8);
    } else {
        buf.push(code | 0x0E);
        append_varuint(buf, len as u64);
    }
}

fn magnitude_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

impl IonValue {
    /// Build a struct from `(symbol, value)` pairs in any order.
    #[must_use]
    pub fn structure(fields: impl IntoIterator<Item = (u32, Self)>) -> Self {
        Self::Struct(fields.into_iter().collect())
    }

    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Self>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Encode this value into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Append this value's encoding to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Null => buf.push(NULL_TAG),
            Self::TypedNull(ty) => buf.push(((*ty as u8) << 4) | 0x0F),
            Self::Bool(true) => buf.push(TRUE_TAG),
            Self::Bool(false) => buf.push(FALSE_TAG),
            Self::Int(i) => {
                let ty = if *i < 0 { IonType::NegInt } else { IonType::PosInt };
                let body = magnitude_bytes(i.unsigned_abs());
                append_header(buf, ty, body.len());
                buf.extend_from_slice(&body);
            }
            Self::Float(f) => {
                append_header(buf, IonType::Float, 8);
                buf.extend_from_slice(&f.to_be_bytes());
            }
            Self::String(s) => {
                append_header(buf, IonType::String, s.len());
                buf.extend_from_slice(s.as_bytes());
            }
            Self::Symbol(id) => {
                let body = magnitude_bytes(u64::from(*id));
                append_header(buf, IonType::Symbol, body.len());
                buf.extend_from_slice(&body);
            }
            Self::Blob(b) => {
                append_header(buf, IonType::Blob, b.len());
                buf.extend_from_slice(b);
            }
            Self::List(items) => {
                let mut body = Vec::new();
                for item in items {
                    item.encode_into(&mut body);
                }
                append_header(buf, IonType::List, body.len());
                buf.extend_from_slice(&body);
            }
            Self::Struct(fields) => {
                let mut sorted: Vec<&(u32, Self)> = fields.iter().collect();
                sorted.sort_by_key(|(symbol, _)| *symbol);
                let mut body = Vec::new();
                for (symbol, value) in sorted {
                    append_varuint(&mut body, u64::from(*symbol));
                    value.encode_into(&mut body);
                }
                append_header(buf, IonType::Struct, body.len());
                buf.extend_from_slice(&body);
            }
        }
    }

    /// Wire type this value encodes as.
    #[must_use]
    pub const fn ion_type(&self) -> IonType {
        match self {
            Self::Null => IonType::Null,
            Self::TypedNull(ty) => *ty,
            Self::Bool(_) => IonType::Bool,
            Self::Int(i) if *i < 0 => IonType::NegInt,
            Self::Int(_) => IonType::PosInt,
            Self::Float(_) => IonType::Float,
            Self::String(_) => IonType::String,
            Self::Symbol(_) => IonType::Symbol,
            Self::Blob(_) => IonType::Blob,
            Self::List(_) => IonType::List,
            Self::Struct(_) => IonType::Struct,
        }
    }
}

impl fmt::Display for IonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::TypedNull(ty) => write!(f, "null.{}", ty.name()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:e}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Symbol(id) => write!(f, "${id}"),
            Self::Blob(b) => write!(f, "{{{{{} bytes}}}}", b.len()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Struct(fields) => {
                f.write_str("{")?;
                for (i, (symbol, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "${symbol}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for IonValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for IonValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for IonValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for IonValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for IonValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<u8>> for IonValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for IonValue {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

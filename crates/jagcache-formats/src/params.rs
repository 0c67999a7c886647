//! Parameter maps attached to config definitions

use crate::cursor::ByteReader;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value of one parameter entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// String parameter
    Str(String),
    /// Integer parameter, stored on disk as a signed 32-bit value
    Int(i64),
}

impl ParamValue {
    /// String value, if this is a string parameter
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Integer value, if this is an integer parameter
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

/// Decode a parameter block:
///
/// ```text
/// count: u8
/// repeated count times:
///     is_string: u8
///     key: u24
///     value: null-terminated string if is_string == 1, else i32
/// ```
///
/// Later entries overwrite earlier ones with the same key.
pub fn read_params(reader: &mut ByteReader<'_>) -> Result<BTreeMap<u32, ParamValue>> {
    let count = reader.read_u8()?;
    let mut params = BTreeMap::new();
    for _ in 0..count {
        let is_string = reader.read_u8()? == 1;
        let key = reader.read_u24()?;
        let value = if is_string {
            ParamValue::Str(reader.read_string()?)
        } else {
            ParamValue::Int(i64::from(reader.read_i32()?))
        };
        params.insert(key, value);
    }
    Ok(params)
}

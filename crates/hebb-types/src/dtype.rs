// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Element types a device tensor can hold

use core::fmt;
use core::str::FromStr;

/// Element type of a tensor.
///
/// There is deliberately no "unknown" member: a tensor always has a concrete element
/// type, so an allocation can never be requested for an unspecified one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "lowercase"))]
pub enum DType {
    /// One byte per element, zero is false and anything else is true
    Bool,
    /// 32-bit signed integer
    Int32,
    /// 32-bit IEEE-754 float
    Float32,
}

impl DType {
    /// All element types, in declaration order
    pub const ALL: [DType; 3] = [DType::Bool, DType::Int32, DType::Float32];

    /// Size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            DType::Bool => 1,
            DType::Int32 | DType::Float32 => 4,
        }
    }

    /// Canonical lowercase name
    pub const fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int32 => "int32",
            DType::Float32 => "float32",
        }
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, DType::Bool)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string does not name a known element type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element type '{0}' (expected bool, int32 or float32)")]
pub struct ParseDTypeError(pub String);

impl FromStr for DType {
    type Err = ParseDTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(DType::Bool),
            "int32" | "i32" | "int" => Ok(DType::Int32),
            "float32" | "f32" | "float" => Ok(DType::Float32),
            other => Err(ParseDTypeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DType::Bool.size(), 1);
        assert_eq!(DType::Int32.size(), 4);
        assert_eq!(DType::Float32.size(), 4);
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("F32".parse::<DType>().unwrap(), DType::Float32);
        assert_eq!("int".parse::<DType>().unwrap(), DType::Int32);
        assert_eq!(" bool ".parse::<DType>().unwrap(), DType::Bool);
        assert!("unknown".parse::<DType>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for dtype in DType::ALL {
            assert_eq!(dtype.to_string().parse::<DType>().unwrap(), dtype);
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&DType::Float32).unwrap();
        assert_eq!(json, "\"float32\"");
    }
}

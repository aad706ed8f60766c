// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Build flags and program naming
//!
//! Kernels are specialised at compile time with `-DNAME=VALUE` defines. WGSL has no
//! preprocessor, so each define becomes a module-scope `const` in a preamble placed in
//! front of the kernel sources:
//!
//! | flag               | rendered                          |
//! |--------------------|-----------------------------------|
//! | `-DN=128`          | `const N: u32 = 128u;`            |
//! | `-DN=-3`           | `const N: i32 = -3i;`             |
//! | `-DN=0.5`          | `const N: f32 = 0.5f;`            |
//! | `-DN=true`, `-DN`  | `const N: bool = true;`           |
//! | `-DN=DTYPE_INT32`  | `const N = DTYPE_INT32;`          |
//!
//! Program names fold a fixed-seed hash of the flag string into the algorithm prefix, so
//! identical flag strings always hit the same cache entry.

use std::fmt::{self, Display, Write};
use std::hash::BuildHasher;

/// Fixed seeds: program names must be stable for the life of the process
const PROGRAM_NAME_SEEDS: [u64; 4] = [
    0x6865_6262_5f63_6f6d,
    0x7075_7465_5f6b_6e6c,
    0x0123_4567_89ab_cdef,
    0xfedc_ba98_7654_3210,
];

/// Ordered list of `-D` defines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags {
    defines: Vec<(String, String)>,
}

impl BuildFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `-DNAME=VALUE`
    pub fn define(mut self, name: &str, value: impl Display) -> Self {
        self.defines.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a bare `-DNAME` (a `true` boolean)
    pub fn flag(mut self, name: &str) -> Self {
        self.defines.push((name.to_string(), String::new()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }
}

impl Display for BuildFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.defines.iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            if value.is_empty() {
                write!(f, "-D{}", name)?;
            } else {
                write!(f, "-D{}={}", name, value)?;
            }
        }
        Ok(())
    }
}

/// Value of a parsed define
#[derive(Debug, Clone, PartialEq)]
pub enum DefineValue {
    Unsigned(u32),
    Signed(i32),
    Float(f32),
    Bool(bool),
    /// Alias of a constant declared by the kernel source
    Ident(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub name: String,
    pub value: DefineValue,
}

impl Define {
    fn render(&self) -> String {
        match &self.value {
            DefineValue::Unsigned(v) => format!("const {}: u32 = {}u;", self.name, v),
            DefineValue::Signed(v) => format!("const {}: i32 = {}i;", self.name, v),
            DefineValue::Float(v) => format!("const {}: f32 = {:?}f;", self.name, v),
            DefineValue::Bool(v) => format!("const {}: bool = {};", self.name, v),
            DefineValue::Ident(alias) => format!("const {} = {};", self.name, alias),
        }
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_value(name: &str, raw: &str) -> Result<DefineValue, String> {
    match raw {
        "" | "true" => return Ok(DefineValue::Bool(true)),
        "false" => return Ok(DefineValue::Bool(false)),
        _ => {}
    }
    if is_identifier(raw) {
        return Ok(DefineValue::Ident(raw.to_string()));
    }
    if let Ok(v) = raw.parse::<u32>() {
        return Ok(DefineValue::Unsigned(v));
    }
    if let Ok(v) = raw.parse::<i32>() {
        return Ok(DefineValue::Signed(v));
    }
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() && raw.contains(['.', 'e', 'E']) => Ok(DefineValue::Float(v)),
        _ => Err(format!("invalid value '{}' for define {}", raw, name)),
    }
}

/// Parse a whitespace-separated `-DNAME[=VALUE]` list
///
/// Returns the offending token in the error message; a name defined twice is rejected.
pub fn parse_build_flags(flags: &str) -> Result<Vec<Define>, String> {
    let mut defines: Vec<Define> = Vec::new();
    for token in flags.split_whitespace() {
        let body = token
            .strip_prefix("-D")
            .ok_or_else(|| format!("unsupported build flag '{}' (expected -DNAME[=VALUE])", token))?;
        let (name, raw) = body.split_once('=').unwrap_or((body, ""));
        if !is_identifier(name) {
            return Err(format!("invalid define name in '{}'", token));
        }
        if body.contains('=') && raw.is_empty() {
            return Err(format!("missing value in '{}'", token));
        }
        if defines.iter().any(|d| d.name == name) {
            return Err(format!("define {} given more than once", name));
        }
        defines.push(Define {
            name: name.to_string(),
            value: parse_value(name, raw)?,
        });
    }
    Ok(defines)
}

/// Generated const preamble followed by every source, as one WGSL module
pub fn render_program_source(defines: &[Define], sources: &[&str]) -> String {
    let mut module = String::new();
    for define in defines {
        module.push_str(&define.render());
        module.push('\n');
    }
    for source in sources {
        module.push('\n');
        module.push_str(source);
    }
    module
}

/// `<prefix><hex hash of flags>`
pub fn program_name(prefix: &str, build_flags: &str) -> String {
    let [k0, k1, k2, k3] = PROGRAM_NAME_SEEDS;
    let hasher = ahash::RandomState::with_seeds(k0, k1, k2, k3);
    format!("{}{:016x}", prefix, BuildHasher::hash_one(&hasher, build_flags))
}

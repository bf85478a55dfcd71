//! Register schema: named fields mapped onto 16-bit holding registers.
//!
//! A [`RegisterSchema`] describes one device's register space: each logical
//! variable has a [`DataKind`] (which fixes how many registers it occupies)
//! and a word offset into the shared holding-register address space.
//!
//! Schemas come from two places:
//!
//! - **Packed layout** ([`RegisterSchema::packed`]): fields occupy consecutive
//!   slots, offsets accumulate from zero. Used for known device profiles
//!   declared in code.
//! - **Declarative layout** ([`RegisterSchema::builder`] / [`parse_layout`]):
//!   every field names its own offset, addressing may be sparse. This is what
//!   device configuration files produce.
//!
//! The schema is built once when the connector is constructed and never
//! mutated afterwards; schema problems are startup failures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::SchemaError;

/// Headroom added above the highest declared offset when sizing a register
/// image from a declarative layout: enough room for the widest field kind.
pub const WIDEST_FIELD_WORDS: usize = 4;

/// Data kind of a register field.
///
/// The kind fixes the field width in 16-bit words and selects the codec
/// routines used to pack and unpack it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    /// One register, unsigned 16-bit value.
    U16,
    /// Two registers, signed 32-bit integer, little-endian word order.
    I32,
    /// Two registers, IEEE-754 single float, little-endian word order.
    F32,
    /// Four registers, signed 64-bit integer, little-endian word order.
    I64,
    /// Four registers, IEEE-754 double float, big-endian word order.
    ///
    /// The word order is the opposite of every other multi-word kind. This
    /// mirrors deployed device behavior and must not be "corrected"; see the
    /// codec tests that pin it.
    F64,
}

impl DataKind {
    /// Number of 16-bit registers a field of this kind occupies.
    pub const fn word_count(&self) -> usize {
        match self {
            Self::U16 => 1,
            Self::I32 | Self::F32 => 2,
            Self::I64 | Self::F64 => 4,
        }
    }

    /// Canonical lowercase name of the kind.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::F64 => "f64",
        }
    }

    /// Parse a kind string as it appears in device configuration files.
    ///
    /// The configuration vocabulary distinguishes signed and unsigned
    /// integers (`short`/`ushort`, `integer`/`uinteger`, `long`/`ulong`);
    /// both spellings fold onto the same width kind, since width and word
    /// order are what the codec needs. Anything else is a hard error:
    /// an unrecognized kind must never silently size to zero registers.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        match s {
            "short" | "ushort" => Ok(Self::U16),
            "integer" | "uinteger" => Ok(Self::I32),
            "long" | "ulong" => Ok(Self::I64),
            "float" => Ok(Self::F32),
            "double" => Ok(Self::F64),
            other => Err(SchemaError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One named field in a register schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    /// Logical variable name, unique within the schema.
    pub name: String,

    /// Data kind of the field.
    pub kind: DataKind,

    /// Word offset of the field's first register.
    pub offset: u16,
}

impl SchemaEntry {
    /// Number of registers this field occupies.
    pub fn word_count(&self) -> usize {
        self.kind.word_count()
    }
}

/// Mapping from logical variable names to register fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterSchema {
    entries: BTreeMap<String, SchemaEntry>,
    span: usize,
}

impl RegisterSchema {
    /// Start building a declarative schema with explicit per-field offsets.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Build a packed schema: fields occupy consecutive register slots in the
    /// given order, starting at offset 0.
    ///
    /// The register span of a packed schema is exactly the sum of the field
    /// word counts.
    pub fn packed<S: Into<String>>(fields: impl IntoIterator<Item = (S, DataKind)>) -> Self {
        let mut entries = BTreeMap::new();
        let mut next_offset = 0usize;
        for (name, kind) in fields {
            let name = name.into();
            entries.insert(
                name.clone(),
                SchemaEntry {
                    name,
                    kind,
                    offset: next_offset as u16,
                },
            );
            next_offset += kind.word_count();
        }
        Self {
            entries,
            span: next_offset,
        }
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries.get(name)
    }

    /// Check if a field exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SchemaEntry> {
        self.entries.values()
    }

    /// Highest declared field offset, if any field exists.
    pub fn max_offset(&self) -> Option<u16> {
        self.entries.values().map(|e| e.offset).max()
    }

    /// Number of registers a buffer for this schema must hold.
    ///
    /// Packed schemas use the exact sum of field widths; declarative schemas
    /// use `max_offset + 4`, conservatively covering the widest possible
    /// field at the highest offset.
    pub fn register_span(&self) -> usize {
        self.span
    }
}

impl<'a> IntoIterator for &'a RegisterSchema {
    type Item = &'a SchemaEntry;
    type IntoIter = std::collections::btree_map::Values<'a, String, SchemaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

/// Builder for declarative schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    entries: BTreeMap<String, SchemaEntry>,
}

impl SchemaBuilder {
    /// Declare a field at an explicit register offset.
    ///
    /// Declaring the same name twice keeps the last declaration.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, kind: DataKind, offset: u16) -> Self {
        let name = name.into();
        self.entries
            .insert(name.clone(), SchemaEntry { name, kind, offset });
        self
    }

    /// Finish the schema. The register span is `max_offset + 4`, or 0 for an
    /// empty schema.
    pub fn build(self) -> RegisterSchema {
        let span = self
            .entries
            .values()
            .map(|e| e.offset as usize)
            .max()
            .map(|max| max + WIDEST_FIELD_WORDS)
            .unwrap_or(0);
        RegisterSchema {
            entries: self.entries,
            span,
        }
    }
}

// ============================================================================
// Layout text parser
// ============================================================================

/// Parse a register layout from the loosely-structured text found in device
/// configuration, one logical entry per line:
///
/// ```text
/// "Day" : {"offset" : 1282, "type" : "ushort"},
/// "U12" : {"offset" : 32768, "type" : "float"}
/// ```
///
/// Several comma-joined entries on one physical line are accepted. This is
/// deliberately *not* a JSON parser: existing configuration files rely on its
/// specific tolerances (stray braces, unquoted whitespace, near-blank lines),
/// so the scanner stays narrowly scoped to the shape above. Lines shorter
/// than three characters are skipped; anything longer must parse, and a line
/// that does not (no colon, missing markers, non-numeric offset) fails the
/// whole layout with [`SchemaError::Malformed`].
pub fn parse_layout(text: &str) -> Result<RegisterSchema, SchemaError> {
    let mut builder = RegisterSchema::builder();

    for line in text.lines() {
        // "}," terminates one entry's inner object and starts the next
        for piece in line.split("},") {
            let entry = piece.trim();
            if entry.len() < 3 {
                // minimum-length guard, kept instead of a blank check for
                // compatibility with existing files
                continue;
            }

            let (name, kind, offset) = scan_entry(entry)?;
            builder = builder.field(name, kind, offset);
        }
    }

    Ok(builder.build())
}

/// Scan a single `"name" : {"offset" : N, "type" : "T"` fragment.
fn scan_entry(entry: &str) -> Result<(String, DataKind, u16), SchemaError> {
    let malformed = || SchemaError::Malformed(entry.to_string());

    // field name: everything before the first ':', stripped of quotes,
    // whitespace and a leading brace
    let colon = entry.find(':').ok_or_else(malformed)?;
    let name = entry[..colon]
        .trim_matches(|c: char| c.is_whitespace() || c == '{' || c == '"')
        .to_string();
    if name.is_empty() {
        return Err(malformed());
    }
    let rest = &entry[colon + 1..];

    // offset: integer between the `offset :` marker and the next comma
    let offset_at = rest.find("offset").ok_or_else(malformed)?;
    let after_marker = &rest[offset_at + "offset".len()..];
    let value_at = after_marker.find(':').ok_or_else(malformed)?;
    let after_colon = &after_marker[value_at + 1..];
    let value_end = after_colon.find(',').ok_or_else(malformed)?;
    let offset = after_colon[..value_end]
        .trim_matches(|c: char| c.is_whitespace() || c == '"')
        .parse::<u16>()
        .map_err(|_| malformed())?;

    // type: string between the `type :` marker and the closing brace
    let type_at = rest.find("type").ok_or_else(malformed)?;
    let after_marker = &rest[type_at + "type".len()..];
    let value_at = after_marker.find(':').ok_or_else(malformed)?;
    let after_colon = &after_marker[value_at + 1..];
    let value_end = after_colon.find('}').unwrap_or(after_colon.len());
    let kind_str = after_colon[..value_end].trim_matches(|c: char| c.is_whitespace() || c == '"');
    let kind = DataKind::parse(kind_str)?;

    Ok((name, kind, offset))
}

//! Table and column metadata from the VOSI `tables` resource.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TapError;

/// TAP+ column role, stored on the server as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnFlag {
    Ra,
    Dec,
    Flux,
    Mag,
    Pk,
}

impl ColumnFlag {
    /// Marks a column as part of the user table (not a role).
    pub const USER_BIT: u32 = 32;

    /// Decode the role carried by a `flags` bitmask.
    pub fn from_bits(flags: u32) -> Option<Self> {
        match flags & !Self::USER_BIT {
            1 => Some(ColumnFlag::Ra),
            2 => Some(ColumnFlag::Dec),
            4 => Some(ColumnFlag::Flux),
            8 => Some(ColumnFlag::Mag),
            16 => Some(ColumnFlag::Pk),
            _ => None,
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            ColumnFlag::Ra => 1,
            ColumnFlag::Dec => 2,
            ColumnFlag::Flux => 4,
            ColumnFlag::Mag => 8,
            ColumnFlag::Pk => 16,
        }
    }

    /// Name used by the table edit service.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnFlag::Ra => "Ra",
            ColumnFlag::Dec => "Dec",
            ColumnFlag::Flux => "Flux",
            ColumnFlag::Mag => "Mag",
            ColumnFlag::Pk => "PK",
        }
    }

    /// Ra, Dec and primary key columns are always indexed.
    pub fn forces_index(&self) -> bool {
        matches!(self, ColumnFlag::Ra | ColumnFlag::Dec | ColumnFlag::Pk)
    }
}

impl FromStr for ColumnFlag {
    type Err = TapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ra" => Ok(ColumnFlag::Ra),
            "dec" => Ok(ColumnFlag::Dec),
            "flux" => Ok(ColumnFlag::Flux),
            "mag" => Ok(ColumnFlag::Mag),
            "pk" => Ok(ColumnFlag::Pk),
            other => Err(TapError::invalid_argument(format!(
                "Unknown column flag '{}': expected Ra, Dec, Flux, Mag or PK",
                other
            ))),
        }
    }
}

impl fmt::Display for ColumnFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapColumn {
    pub name: String,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub utype: Option<String>,
    pub data_type: Option<String>,
    pub arraysize: Option<String>,
    /// Values of the `<flag>` children (`indexed`, `primary`, `nullable`).
    pub flag: Vec<String>,
    /// TAP+ `flags` bitmask.
    pub flags: Option<u32>,
}

impl TapColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn column_flag(&self) -> Option<ColumnFlag> {
        self.flags.and_then(ColumnFlag::from_bits)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flag.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub fn is_indexed(&self) -> bool {
        self.has_flag("indexed") || self.column_flag().is_some_and(|f| f.forces_index())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapTable {
    pub schema: String,
    pub name: String,
    pub description: Option<String>,
    /// TAP+ `size_bytes` attribute.
    pub size_bytes: Option<u64>,
    pub columns: Vec<TapColumn>,
}

impl TapTable {
    /// `schema.table`. Names that already carry their schema are returned as is.
    pub fn qualified_name(&self) -> String {
        if self.schema.is_empty() || self.name.contains('.') {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    pub fn column(&self, name: &str) -> Option<&TapColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name of the column carrying `flag`, if any.
    pub fn column_with_flag(&self, flag: ColumnFlag) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.column_flag() == Some(flag))
            .map(|c| c.name.as_str())
    }
}

impl fmt::Display for TapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TAP Table name: {}\nDescription: {}\nNum. columns: {}",
            self.qualified_name(),
            self.description.as_deref().unwrap_or(""),
            self.columns.len()
        )
    }
}

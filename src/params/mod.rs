//! Typed parameter model and the fixed OGN tracker schema.

pub mod codec;

pub use codec::{decode_table, encode_entry, nearest_key, split_line};

use serde::{Deserialize, Serialize};

/// How a parameter's raw device text maps to a meaningful value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Value is the raw text verbatim.
    PlainString,
    /// Raw text is a base-16 index into the option list.
    IndexedEnumHex(&'static [&'static str]),
    /// Raw text is a base-10 index into the option list.
    IndexedEnumDecimal(&'static [&'static str]),
    /// Raw text is an integer snapped to the closest key of a sparse table.
    NearestMatchTable(&'static [(i64, &'static str)]),
}

/// Schema entry describing one named parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

/// A decoded parameter value as shown to (and edited by) the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Free-form text.
    Text(String),
    /// Selected option of an indexed enumeration.
    Choice { index: usize, label: String },
    /// Selected entry of a nearest-match table.
    TableEntry { key: i64, label: String },
}

impl ParamValue {
    pub fn label(&self) -> &str {
        match self {
            ParamValue::Text(text) => text,
            ParamValue::Choice { label, .. } => label,
            ParamValue::TableEntry { label, .. } => label,
        }
    }
}

/// One live, editable row of the config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub name: String,
    /// Text exactly as the device reported it.
    pub raw: String,
    pub value: ParamValue,
    /// Set whenever the displayed value diverges from what the device holds.
    pub modified: bool,
}

impl ParameterEntry {
    /// Replace the displayed value, marking the entry modified if it changed.
    pub fn set_value(&mut self, value: ParamValue) {
        if value != self.value {
            self.value = value;
            self.modified = true;
        }
    }
}

/// Ordered parameter table for one read cycle. Rebuilt wholesale on every
/// refresh, never patched incrementally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTable {
    pub entries: Vec<ParameterEntry>,
}

impl ParameterTable {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn modified(&self) -> impl Iterator<Item = &ParameterEntry> {
        self.entries.iter().filter(|e| e.modified)
    }
}

/// Aircraft type labels, indexed by the device's hex AcftType value.
pub const AIRCRAFT_TYPES: &[&str] = &[
    "Unknown",
    "(Moto-)glider",
    "Tow plane",
    "Helicopter",
    "Parachute",
    "Drop plane",
    "hang-glider",
    "Para-glider",
    "Powered aircraft",
    "Jet aircraft",
    "UFO",
    "Balloon",
    "Airship",
    "UAV",
    "Ground support",
    "Static object",
];

/// Address type labels, indexed by the device's hex AddrType value.
pub const ADDRESS_TYPES: &[&str] = &["Random", "ICAO", "FLARM", "OGN"];

/// Frequency plan labels, indexed by the device's decimal FreqPlan value.
pub const FREQ_PLANS: &[&str] = &[
    "Automatic",
    "Europe",
    "USA/Canada",
    "South America /Australia",
];

/// Transmit power table: sparse dBm keys with operator-facing labels.
pub const POWER_SETTINGS: &[(i64, &str)] = &[(10, "LOW"), (14, "NORMAL"), (22, "HIGH")];

/// The fixed set of parameters the configurator knows how to edit, in the
/// order the device reports them.
pub const SCHEMA: &[ParameterSpec] = &[
    ParameterSpec {
        name: "Address",
        kind: ParamKind::PlainString,
    },
    ParameterSpec {
        name: "AddrType",
        kind: ParamKind::IndexedEnumHex(ADDRESS_TYPES),
    },
    ParameterSpec {
        name: "AcftType",
        kind: ParamKind::IndexedEnumHex(AIRCRAFT_TYPES),
    },
    ParameterSpec {
        name: "TxPower",
        kind: ParamKind::NearestMatchTable(POWER_SETTINGS),
    },
    ParameterSpec {
        name: "FreqPlan",
        kind: ParamKind::IndexedEnumDecimal(FREQ_PLANS),
    },
];

/// Look up the schema entry for a parameter name.
pub fn spec_for(name: &str) -> Option<&'static ParameterSpec> {
    SCHEMA.iter().find(|s| s.name == name)
}

/// A parameter edit that cannot be mapped back to device text.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot encode {name}: {reason}")]
pub struct EncodeError {
    pub name: String,
    pub reason: String,
}

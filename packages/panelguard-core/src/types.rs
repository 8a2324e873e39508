use core::fmt;

use serde::{Deserialize, Serialize};

use crate::detector::MethodKind;

pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";

/// Price fields judged by the range-band method, in bar order.
pub const PRICE_FIELDS: [&str; 4] = [OPEN, HIGH, LOW, CLOSE];

/// Which panel fields a detection run looks at. Fields outside the
/// selection pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSelection {
    #[default]
    All,
    Only(Vec<String>),
    Exclude(Vec<String>),
}

impl FieldSelection {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            FieldSelection::All => true,
            FieldSelection::Only(names) => names.iter().any(|n| n == name),
            FieldSelection::Exclude(names) => !names.iter().any(|n| n == name),
        }
    }

    pub(crate) fn names(&self) -> &[String] {
        match self {
            FieldSelection::All => &[],
            FieldSelection::Only(names) | FieldSelection::Exclude(names) => names,
        }
    }
}

/// Placement of the reference window relative to the judged observation.
///
/// The judged observation is never part of its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// `window` observations strictly before the point (usable online).
    #[default]
    Trailing,
    /// `window / 2` before and `window - window / 2` after (in-sample estimation).
    Centered,
}

/// What to put in place of a flagged cell when producing a cleaned panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Repair {
    /// Leave the flagged cell missing.
    #[default]
    Missing,
    /// Latest prior valid value of the same entity.
    ForwardFill,
    /// Linear interpolation in time between valid neighbours.
    Interpolate,
    /// The detector's fitted value at that position.
    Fitted,
}

/// Recoverable per-entity condition. Reported alongside the result, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    InsufficientHistory {
        entity: String,
        method: MethodKind,
        field: String,
        required: usize,
        available: usize,
    },
    MissingField {
        entity: String,
        method: MethodKind,
        field: String,
    },
    NoSeasonality {
        entity: String,
        method: MethodKind,
        field: String,
    },
}

impl Warning {
    pub fn field(&self) -> &str {
        match self {
            Warning::InsufficientHistory { field, .. }
            | Warning::MissingField { field, .. }
            | Warning::NoSeasonality { field, .. } => field,
        }
    }

    pub fn method(&self) -> MethodKind {
        match self {
            Warning::InsufficientHistory { method, .. }
            | Warning::MissingField { method, .. }
            | Warning::NoSeasonality { method, .. } => *method,
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            Warning::InsufficientHistory { entity, .. }
            | Warning::MissingField { entity, .. }
            | Warning::NoSeasonality { entity, .. } => entity,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InsufficientHistory {
                entity,
                method,
                field,
                required,
                available,
            } => write!(
                f,
                "{entity}/{field}: {method} needs {required} observations, only {available} available; left unflagged"
            ),
            Warning::MissingField {
                entity,
                method,
                field,
            } => write!(f, "{entity}: {method} requires field `{field}`; entity skipped"),
            Warning::NoSeasonality {
                entity,
                method,
                field,
            } => write!(f, "{entity}/{field}: {method} found no seasonal period; left unflagged"),
        }
    }
}

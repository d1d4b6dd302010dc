//! The single place where source vocabularies for money direction are normalised.

use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};

/// Which way money moved in a transaction.
///
/// Records arrive with a free-form direction string ("gain", "loss",
/// "inflow", ...). [Direction::classify] maps all of them to this enum, so no
/// other code needs to know about the synonyms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Money received.
    Inflow,
    /// Money spent.
    Outflow,
    /// Anything else, e.g. transfers. Excluded from sums but still tracked
    /// for category and payment method membership.
    Neutral,
}

impl Direction {
    /// Normalise a source direction string.
    ///
    /// Matching ignores case and surrounding whitespace. Unknown strings are
    /// [Direction::Neutral].
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gain" | "inflow" | "income" | "credit" => Direction::Inflow,
            "loss" | "outflow" | "expense" | "debit" => Direction::Outflow,
            _ => Direction::Neutral,
        }
    }

    /// The sign applied to a record's amount magnitude.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Inflow => 1.0,
            Direction::Outflow => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    /// The canonical string stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inflow => "inflow",
            Direction::Outflow => "outflow",
            Direction::Neutral => "neutral",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Direction::classify(&raw))
    }
}

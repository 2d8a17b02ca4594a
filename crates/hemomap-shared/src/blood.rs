//! The eight ABO/Rh blood types and their donation compatibility tables.
//!
//! The tables are static data, loaded once and immutable for the process
//! lifetime. There is no fallback entry: the enum is closed, so the only
//! place an unknown code can appear is [`BloodType::from_str`], which
//! rejects it with [`UnknownBloodType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownBloodType;

/// One of the eight ABO/Rh blood types, in the fixed order used throughout
/// the sheet schema and the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

use BloodType::*;

impl BloodType {
    /// All eight types in canonical order. Sheet columns and availability
    /// flags follow this ordering.
    pub const ALL: [BloodType; 8] = [
        APositive, ANegative, BPositive, BNegative, AbPositive, AbNegative, OPositive, ONegative,
    ];

    /// Clinical notation, e.g. `"AB-"`.
    pub fn as_str(self) -> &'static str {
        match self {
            APositive => "A+",
            ANegative => "A-",
            BPositive => "B+",
            BNegative => "B-",
            AbPositive => "AB+",
            AbNegative => "AB-",
            OPositive => "O+",
            ONegative => "O-",
        }
    }

    /// Position of this type in [`BloodType::ALL`].
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|&t| t == self).unwrap_or(0)
    }

    /// Types a donor of this blood type can donate to.
    pub fn donate_to(self) -> &'static [BloodType] {
        match self {
            OPositive => &[OPositive, APositive, BPositive, AbPositive],
            APositive => &[APositive, AbPositive],
            BPositive => &[BPositive, AbPositive],
            AbPositive => &[AbPositive],
            ONegative => &[
                OPositive, ONegative, APositive, ANegative, BPositive, BNegative, AbPositive,
                AbNegative,
            ],
            ANegative => &[ANegative, APositive, AbNegative, AbPositive],
            BNegative => &[BNegative, BPositive, AbNegative, AbPositive],
            AbNegative => &[AbNegative, AbPositive],
        }
    }

    /// Types a recipient of this blood type can receive from.
    pub fn receive_from(self) -> &'static [BloodType] {
        match self {
            OPositive => &[OPositive, ONegative],
            APositive => &[APositive, ANegative, OPositive, ONegative],
            BPositive => &[BPositive, BNegative, OPositive, ONegative],
            AbPositive => &[
                AbPositive, AbNegative, APositive, ANegative, BPositive, BNegative, OPositive,
                ONegative,
            ],
            ONegative => &[ONegative],
            ANegative => &[ANegative, ONegative],
            BNegative => &[BNegative, ONegative],
            AbNegative => &[AbNegative, ANegative, BNegative, ONegative],
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = UnknownBloodType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownBloodType(s.to_string()))
    }
}

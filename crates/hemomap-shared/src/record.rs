//! The donor record model.
//!
//! One record corresponds to one sheet row. The store persists records
//! through the canonical column schema (`hemomap-store::schema`); nothing in
//! this crate touches storage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::blood::BloodType;

/// Latitude/longitude pair, persisted as `"lat,lng"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

impl FromStr for GeoPoint {
    type Err = GeoPointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| GeoPointParseError(s.to_string()))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| GeoPointParseError(s.to_string()))?;
        let lng = lng
            .trim()
            .parse::<f64>()
            .map_err(|_| GeoPointParseError(s.to_string()))?;
        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid coordinate pair: {0:?}")]
pub struct GeoPointParseError(pub String);

/// The encrypted form of a donor's access password, both at rest and on the
/// wire. Ciphertext and IV are base64 (standard alphabet, padded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub ciphertext: String,
    pub iv: String,
}

/// One availability flag per blood type; `true` means "currently low/needed
/// at this location". Flags are kept in [`BloodType::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Availability {
    flags: [bool; 8],
}

impl Availability {
    pub fn get(&self, blood_type: BloodType) -> bool {
        self.flags[blood_type.index()]
    }

    pub fn set(&mut self, blood_type: BloodType, needed: bool) {
        self.flags[blood_type.index()] = needed;
    }

    /// Blood types currently flagged as needed, in canonical order.
    pub fn needed(&self) -> Vec<BloodType> {
        BloodType::ALL
            .into_iter()
            .filter(|t| self.get(*t))
            .collect()
    }
}

impl FromIterator<(BloodType, bool)> for Availability {
    fn from_iter<I: IntoIterator<Item = (BloodType, bool)>>(iter: I) -> Self {
        let mut availability = Self::default();
        for (blood_type, needed) in iter {
            availability.set(blood_type, needed);
        }
        availability
    }
}

/// One registered donor/location. The username is the lookup key; it is not
/// guaranteed unique, and the submit pipeline takes the first match.
#[derive(Debug, Clone, PartialEq)]
pub struct DonorRecord {
    pub username: String,
    pub secret: EncryptedSecret,
    pub location: GeoPoint,
    pub availability: Availability,
    /// Set from server-observed time on every accepted mutation, never
    /// client-supplied.
    pub updated_at: Option<DateTime<Utc>>,
    pub share_path: String,
    pub external_url: String,
}

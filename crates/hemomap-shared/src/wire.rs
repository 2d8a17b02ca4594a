//! JSON payloads exchanged between clients and the server.
//!
//! Unknown fields are ignored on deserialization (tolerant reader); in
//! particular there is no payload field that maps onto a record's
//! `updated_at`, which is always server-assigned.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::blood::BloodType;
use crate::record::{EncryptedSecret, GeoPoint};

/// `POST /api/submit`: a donor's credential-checked status update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub username: String,
    /// The donor's password, encrypted client-side with the shared key.
    pub secret: EncryptedSecret,
    /// Per-type overwrite of availability flags. Absent types keep their
    /// stored value.
    #[serde(default)]
    pub availability: HashMap<BloodType, bool>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub result: String,
}

/// `GET /api/mapdata`: the public projection of the sheet. Private columns
/// (username, secret, iv) are already sliced off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// `POST /api/admin/register`: append a new donor row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub secret: EncryptedSecret,
    pub location: GeoPoint,
    #[serde(default)]
    pub share_path: String,
    #[serde(default)]
    pub external_url: String,
}

/// `POST /api/admin/delete`: delete by row index (position in the last
/// listing, header excluded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub row: usize,
}

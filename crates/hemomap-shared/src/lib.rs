//! # hemomap-shared
//!
//! Types shared between the hemomap server and its clients.
//!
//! Everything the submitting side and the verifying side must agree on lives
//! here: the closed blood-type enum with its donate/receive compatibility
//! tables, the marker matcher that drives the map view's filtering, the
//! symmetric cipher both sides derive from one pre-shared seed, the donor
//! record model, and the JSON wire payloads.

pub mod blood;
pub mod cipher;
pub mod matcher;
pub mod record;
pub mod wire;

mod error;

pub use blood::BloodType;
pub use cipher::SecretKey;
pub use error::{CipherError, UnknownBloodType};
pub use record::{Availability, DonorRecord, EncryptedSecret, GeoPoint};

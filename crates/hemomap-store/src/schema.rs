//! Canonical sheet schema, version 1.
//!
//! Columns, in order: `username`, `secret`, `iv`, `location`, one
//! `"TRUE"`/`"FALSE"` flag per blood type in [`BloodType::ALL`] order,
//! `updated_at` (RFC 3339 or empty), `share_path`, `external_url`.
//!
//! Decoding is strict: wrong arity, an unexpected header, or a malformed
//! cell is a [`StoreError::Schema`], never a silently defaulted field. New
//! columns require a new schema version and a migration.

use chrono::{DateTime, Utc};
use hemomap_shared::matcher::Marker;
use hemomap_shared::{Availability, BloodType, DonorRecord, EncryptedSecret};

use crate::error::{Result, StoreError};
use crate::Row;

pub const SCHEMA_VERSION: u32 = 1;

/// Total column count.
pub const COLUMNS: usize = 15;

/// Index of the first public column. Everything before it (`username`,
/// `secret`, `iv`) is private and must never reach the map view.
pub const PUBLIC_OFFSET: usize = 3;

const FLAG_TRUE: &str = "TRUE";
const FLAG_FALSE: &str = "FALSE";

/// The schema v1 header row.
pub fn header() -> Row {
    let mut columns = vec![
        "username".to_string(),
        "secret".to_string(),
        "iv".to_string(),
        "location".to_string(),
    ];
    columns.extend(BloodType::ALL.iter().map(|t| t.as_str().to_string()));
    columns.push("updated_at".to_string());
    columns.push("share_path".to_string());
    columns.push("external_url".to_string());
    columns
}

/// The header of the public projection.
pub fn public_header() -> Vec<String> {
    header().split_off(PUBLIC_OFFSET)
}

/// Slice the private columns off a data row.
pub fn public_row(row: &[String]) -> Vec<String> {
    row.get(PUBLIC_OFFSET..).unwrap_or_default().to_vec()
}

/// Check a sheet's header row against schema v1.
pub fn check_header(row: &[String]) -> Result<()> {
    let expected = header();
    if row != expected.as_slice() {
        return Err(StoreError::Schema(format!(
            "Sheet header does not match schema v{SCHEMA_VERSION}: expected {expected:?}, got {row:?}"
        )));
    }
    Ok(())
}

pub fn record_to_row(record: &DonorRecord) -> Row {
    let mut row = vec![
        record.username.clone(),
        record.secret.ciphertext.clone(),
        record.secret.iv.clone(),
        record.location.to_string(),
    ];
    for blood_type in BloodType::ALL {
        row.push(flag_to_cell(record.availability.get(blood_type)).to_string());
    }
    row.push(
        record
            .updated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
    );
    row.push(record.share_path.clone());
    row.push(record.external_url.clone());
    row
}

pub fn row_to_record(row: &[String]) -> Result<DonorRecord> {
    if row.len() != COLUMNS {
        return Err(StoreError::Schema(format!(
            "Expected {COLUMNS} columns, got {}",
            row.len()
        )));
    }

    let location = row[3]
        .parse()
        .map_err(|e| StoreError::Schema(format!("Bad location cell: {e}")))?;

    let mut availability = Availability::default();
    for (i, blood_type) in BloodType::ALL.into_iter().enumerate() {
        availability.set(blood_type, cell_to_flag(&row[4 + i])?);
    }

    Ok(DonorRecord {
        username: row[0].clone(),
        secret: EncryptedSecret {
            ciphertext: row[1].clone(),
            iv: row[2].clone(),
        },
        location,
        availability,
        updated_at: parse_updated_at(&row[12])?,
        share_path: row[13].clone(),
        external_url: row[14].clone(),
    })
}

/// Decode a public-projection row into the marker the map renders.
pub fn public_row_to_marker(row: &[String]) -> Result<Marker> {
    if row.len() != COLUMNS - PUBLIC_OFFSET {
        return Err(StoreError::Schema(format!(
            "Expected {} public columns, got {}",
            COLUMNS - PUBLIC_OFFSET,
            row.len()
        )));
    }

    let position = row[0]
        .parse()
        .map_err(|e| StoreError::Schema(format!("Bad location cell: {e}")))?;

    let mut needed = Vec::new();
    for (i, blood_type) in BloodType::ALL.into_iter().enumerate() {
        if cell_to_flag(&row[1 + i])? {
            needed.push(blood_type);
        }
    }

    Ok(Marker {
        position,
        needed,
        updated_at: parse_updated_at(&row[9])?,
        link: row[11].clone(),
    })
}

fn flag_to_cell(flag: bool) -> &'static str {
    if flag {
        FLAG_TRUE
    } else {
        FLAG_FALSE
    }
}

fn cell_to_flag(cell: &str) -> Result<bool> {
    match cell {
        FLAG_TRUE => Ok(true),
        FLAG_FALSE => Ok(false),
        other => Err(StoreError::Schema(format!(
            "Bad availability cell: {other:?}"
        ))),
    }
}

fn parse_updated_at(cell: &str) -> Result<Option<DateTime<Utc>>> {
    if cell.is_empty() {
        return Ok(None);
    }
    let parsed = DateTime::parse_from_rfc3339(cell)
        .map_err(|e| StoreError::Schema(format!("Bad updated_at cell: {e}")))?;
    Ok(Some(parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemomap_shared::GeoPoint;

    fn sample_record() -> DonorRecord {
        let mut availability = Availability::default();
        availability.set(BloodType::APositive, true);
        availability.set(BloodType::ONegative, true);
        DonorRecord {
            username: "alice".to_string(),
            secret: EncryptedSecret {
                ciphertext: "Y2lwaGVy".to_string(),
                iv: "aXZpdml2".to_string(),
            },
            location: GeoPoint {
                lat: -8.0671132,
                lng: -34.8766719,
            },
            availability,
            updated_at: Some("2026-08-01T12:00:00Z".parse().unwrap()),
            share_path: "hemocentro-pe".to_string(),
            external_url: "https://maps.example/hemocentro-pe".to_string(),
        }
    }

    #[test]
    fn test_header_shape() {
        let header = header();
        assert_eq!(header.len(), COLUMNS);
        assert_eq!(header[0], "username");
        assert_eq!(header[4], "A+");
        assert_eq!(header[11], "O-");
        assert_eq!(header[14], "external_url");
    }

    #[test]
    fn test_record_row_roundtrip() {
        let record = sample_record();
        let row = record_to_row(&record);
        assert_eq!(row.len(), COLUMNS);
        assert_eq!(row_to_record(&row).unwrap(), record);
    }

    #[test]
    fn test_no_updated_at_persists_as_empty_cell() {
        let mut record = sample_record();
        record.updated_at = None;
        let row = record_to_row(&record);
        assert_eq!(row[12], "");
        assert_eq!(row_to_record(&row).unwrap().updated_at, None);
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let mut row = record_to_row(&sample_record());
        row.pop();
        assert!(matches!(row_to_record(&row), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_bad_flag_cell_rejected() {
        let mut row = record_to_row(&sample_record());
        row[4] = "yes".to_string();
        assert!(matches!(row_to_record(&row), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_bad_location_cell_rejected() {
        let mut row = record_to_row(&sample_record());
        row[3] = "somewhere".to_string();
        assert!(matches!(row_to_record(&row), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_header_check() {
        assert!(check_header(&header()).is_ok());
        let mut stale = header();
        stale[1] = "password".to_string();
        assert!(matches!(check_header(&stale), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_public_projection_excludes_secrets() {
        let record = sample_record();
        let public = public_row(&record_to_row(&record));
        assert_eq!(public.len(), COLUMNS - PUBLIC_OFFSET);
        assert!(!public.contains(&record.username));
        assert!(!public.contains(&record.secret.ciphertext));
        assert!(!public.contains(&record.secret.iv));
        assert_eq!(public_header()[0], "location");
    }

    #[test]
    fn test_public_row_to_marker() {
        let record = sample_record();
        let marker = public_row_to_marker(&public_row(&record_to_row(&record))).unwrap();
        assert_eq!(marker.position, record.location);
        assert_eq!(marker.needed, vec![BloodType::APositive, BloodType::ONegative]);
        assert_eq!(marker.updated_at, record.updated_at);
        assert_eq!(marker.link, record.external_url);
    }
}

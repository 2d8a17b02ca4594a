//! Compatibility filtering for map markers.
//!
//! Models the map view's question: "show me donation sites whose need
//! matches something I (or my group of donors) can supply."

use chrono::{DateTime, Utc};

use crate::blood::BloodType;
use crate::record::GeoPoint;

/// The public projection of a donor record as the map consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: GeoPoint,
    /// Blood types currently flagged as needed at this location.
    pub needed: Vec<BloodType>,
    pub updated_at: Option<DateTime<Utc>>,
    pub link: String,
}

/// Keep the markers relevant to the selected donor blood types.
///
/// An empty selection is the identity filter. Otherwise a marker is kept
/// when at least one of its needed types appears in the union of
/// `donate_to(t)` over the selected types. Input order is preserved and
/// duplicates pass through.
pub fn filter_markers(markers: Vec<Marker>, selected: &[BloodType]) -> Vec<Marker> {
    if selected.is_empty() {
        return markers;
    }

    markers
        .into_iter()
        .filter(|marker| {
            selected.iter().any(|donor| {
                let compatible = donor.donate_to();
                marker.needed.iter().any(|need| compatible.contains(need))
            })
        })
        .collect()
}

//! The credential-checked submit pipeline: LOOKUP → VERIFY → APPLY/REJECT.
//!
//! LOOKUP lists the sheet and takes the first row whose username matches
//! the submission. VERIFY decrypts the stored secret and the submitted
//! secret with the process-wide key and compares the plaintexts in constant
//! time; a mismatch and any decryption failure are both [`SubmitError::Forbidden`]
//! so the outcome leaks nothing about why. APPLY merges the update, stamps
//! `updated_at` from server time, and replaces the row.
//!
//! The store does not provide read-modify-write atomicity, so the pipeline
//! holds a per-username lock across the whole sequence; submissions for
//! different usernames proceed concurrently. Lock entries are evicted as
//! soon as no submission holds them, so the map stays bounded by the number
//! of in-flight requests.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use hemomap_shared::wire::SubmitRequest;
use hemomap_shared::{cipher, DonorRecord, EncryptedSecret, SecretKey};
use hemomap_store::{schema, RowStore, StoreError};

#[derive(Debug, Error)]
pub enum SubmitError {
    /// No row for the submitted username. Distinct from [`SubmitError::Forbidden`]:
    /// an absent record is not an authentication failure.
    #[error("No record for that username")]
    NotFound,

    /// Secret mismatch or undecryptable secret, on either side.
    #[error("Wrong password")]
    Forbidden,

    /// Backing-store failure, before or after verification. Never conflated
    /// with Forbidden: callers must be able to tell "wrong password" from
    /// "your update was not saved".
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

pub struct SubmitPipeline<S> {
    store: Arc<S>,
    key: SecretKey,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: RowStore> SubmitPipeline<S> {
    pub fn new(store: Arc<S>, key: SecretKey) -> Self {
        Self {
            store,
            key,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one submission through the pipeline. On success returns the
    /// record as it was before the update, for observability; secrets in it
    /// must not be logged.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<DonorRecord, SubmitError> {
        let lock = self.lock_for(&request.username).await;
        let guard = lock.lock().await;

        let result = self.run_locked(request).await;

        drop(guard);
        self.release(&request.username, lock).await;
        result
    }

    async fn run_locked(&self, request: &SubmitRequest) -> Result<DonorRecord, SubmitError> {
        // LOOKUP
        let rows = self.store.list_rows().await?;
        let Some((index, mut record)) = find_candidate(&rows, &request.username)? else {
            debug!(username = %request.username, "Submission for unknown username");
            return Err(SubmitError::NotFound);
        };

        // VERIFY: runs unconditionally, whatever the update payload holds.
        if let Err(e) = self.verify(&record.secret, &request.secret) {
            warn!(username = %request.username, "Rejected submission");
            return Err(e);
        }

        // APPLY
        let previous = record.clone();
        for (&blood_type, &needed) in &request.availability {
            record.availability.set(blood_type, needed);
        }
        if let Some(location) = request.location {
            record.location = location;
        }
        record.updated_at = Some(Utc::now());

        self.store
            .replace_row(index, schema::record_to_row(&record))
            .await?;

        Ok(previous)
    }

    /// Decrypt both secrets with the shared key and compare the plaintexts.
    /// Every failure collapses into `Forbidden`.
    fn verify(
        &self,
        stored: &EncryptedSecret,
        submitted: &EncryptedSecret,
    ) -> Result<(), SubmitError> {
        let stored_plain =
            cipher::decrypt(stored, &self.key).map_err(|_| SubmitError::Forbidden)?;
        let submitted_plain =
            cipher::decrypt(submitted, &self.key).map_err(|_| SubmitError::Forbidden)?;

        // ct_eq already yields false on length mismatch for slices.
        if stored_plain
            .as_bytes()
            .ct_eq(submitted_plain.as_bytes())
            .unwrap_u8()
            != 1
        {
            return Err(SubmitError::Forbidden);
        }
        Ok(())
    }

    async fn lock_for(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(username.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Hand back a lock handle and evict the map entry once no other
    /// submission holds it. The map lock is held while counting, so no other
    /// task can clone the entry in between; strong count 1 means only the
    /// map's own handle remains.
    async fn release(&self, username: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        drop(lock);
        if locks
            .get(username)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(username);
        }
    }
}

/// First row whose username matches, decoded through the canonical schema.
/// A row that fails to decode is a storage-level schema fault, not a lookup
/// miss.
fn find_candidate(
    rows: &[hemomap_store::Row],
    username: &str,
) -> Result<Option<(usize, DonorRecord)>, SubmitError> {
    for (index, row) in rows.iter().enumerate() {
        let record = schema::row_to_record(row)?;
        if record.username == username {
            return Ok(Some((index, record)));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemomap_shared::{Availability, BloodType, GeoPoint};
    use hemomap_store::{MemoryStore, Row};

    const SEED: &str = "0123456789abcdef0123456789abcdef";

    fn key() -> SecretKey {
        SecretKey::derive(SEED).unwrap()
    }

    fn stored_record(username: &str, password: &str) -> DonorRecord {
        DonorRecord {
            username: username.to_string(),
            secret: cipher::encrypt(password, &key()),
            location: GeoPoint {
                lat: -8.0671132,
                lng: -34.8766719,
            },
            availability: Availability::default(),
            updated_at: None,
            share_path: String::new(),
            external_url: String::new(),
        }
    }

    fn pipeline_with(records: &[DonorRecord]) -> SubmitPipeline<MemoryStore> {
        let rows: Vec<Row> = records.iter().map(schema::record_to_row).collect();
        SubmitPipeline::new(Arc::new(MemoryStore::with_rows(rows)), key())
    }

    fn request(username: &str, password: &str) -> SubmitRequest {
        SubmitRequest {
            username: username.to_string(),
            secret: cipher::encrypt(password, &key()),
            availability: HashMap::new(),
            location: None,
        }
    }

    async fn record_at(pipeline: &SubmitPipeline<MemoryStore>, index: usize) -> DonorRecord {
        let rows = pipeline.store.list_rows().await.unwrap();
        schema::row_to_record(&rows[index]).unwrap()
    }

    #[tokio::test]
    async fn test_correct_password_applies_update() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        let mut req = request("alice", "hunter2");
        req.availability.insert(BloodType::APositive, true);

        let previous = pipeline.submit(&req).await.unwrap();
        assert!(!previous.availability.get(BloodType::APositive));
        assert_eq!(previous.updated_at, None);

        let updated = record_at(&pipeline, 0).await;
        assert!(updated.availability.get(BloodType::APositive));
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected_and_row_unchanged() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);
        let before = record_at(&pipeline, 0).await;

        let mut req = request("alice", "wrong");
        req.availability.insert(BloodType::APositive, true);

        assert!(matches!(
            pipeline.submit(&req).await,
            Err(SubmitError::Forbidden)
        ));
        assert_eq!(record_at(&pipeline, 0).await, before);
    }

    #[tokio::test]
    async fn test_unknown_username_is_not_found() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        assert!(matches!(
            pipeline.submit(&request("nobody", "hunter2")).await,
            Err(SubmitError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_malformed_submitted_secret_is_forbidden() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        let mut req = request("alice", "hunter2");
        req.secret = EncryptedSecret {
            ciphertext: "not base64!".to_string(),
            iv: "also not".to_string(),
        };

        // Malformed input and a wrong password look identical to the caller.
        assert!(matches!(
            pipeline.submit(&req).await,
            Err(SubmitError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_empty_payload_still_verifies() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        // Nothing to update, wrong password: verification still runs.
        assert!(matches!(
            pipeline.submit(&request("alice", "wrong")).await,
            Err(SubmitError::Forbidden)
        ));

        // Nothing to update, right password: accepted, timestamp advances.
        pipeline.submit(&request("alice", "hunter2")).await.unwrap();
        assert!(record_at(&pipeline, 0).await.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent_on_flags() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        let mut req = request("alice", "hunter2");
        req.availability.insert(BloodType::ONegative, true);

        pipeline.submit(&req).await.unwrap();
        let first = record_at(&pipeline, 0).await;

        pipeline.submit(&req).await.unwrap();
        let second = record_at(&pipeline, 0).await;

        assert_eq!(first.availability, second.availability);
        assert!(second.updated_at.unwrap() >= first.updated_at.unwrap());
    }

    #[tokio::test]
    async fn test_location_update() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        let mut req = request("alice", "hunter2");
        req.location = Some(GeoPoint { lat: 1.5, lng: 2.5 });

        pipeline.submit(&req).await.unwrap();
        assert_eq!(
            record_at(&pipeline, 0).await.location,
            GeoPoint { lat: 1.5, lng: 2.5 }
        );
    }

    #[tokio::test]
    async fn test_first_matching_row_wins() {
        let mut second = stored_record("alice", "hunter2");
        second.share_path = "second".to_string();
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2"), second]);

        pipeline.submit(&request("alice", "hunter2")).await.unwrap();

        assert!(record_at(&pipeline, 0).await.updated_at.is_some());
        assert!(record_at(&pipeline, 1).await.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_row_is_storage_error() {
        let mut row = schema::record_to_row(&stored_record("alice", "hunter2"));
        row[4] = "maybe".to_string();
        let pipeline = SubmitPipeline::new(Arc::new(MemoryStore::with_rows(vec![row])), key());

        assert!(matches!(
            pipeline.submit(&request("alice", "hunter2")).await,
            Err(SubmitError::Storage(StoreError::Schema(_)))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_submissions_for_same_username_serialize() {
        let pipeline = Arc::new(pipeline_with(&[stored_record("alice", "hunter2")]));

        let mut req_a = request("alice", "hunter2");
        req_a.availability.insert(BloodType::APositive, true);
        let mut req_b = request("alice", "hunter2");
        req_b.availability.insert(BloodType::BPositive, true);

        let a = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.submit(&req_a).await }
        });
        let b = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.submit(&req_b).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Neither update may clobber the other.
        let record = record_at(&pipeline, 0).await;
        assert!(record.availability.get(BloodType::APositive));
        assert!(record.availability.get(BloodType::BPositive));
    }

    #[tokio::test]
    async fn test_lock_map_does_not_retain_completed_entries() {
        let pipeline = pipeline_with(&[stored_record("alice", "hunter2")]);

        // Unknown usernames are attacker-chosen input; none may stick around.
        for i in 0..1000 {
            let result = pipeline.submit(&request(&format!("ghost-{i}"), "x")).await;
            assert!(matches!(result, Err(SubmitError::NotFound)));
        }

        pipeline.submit(&request("alice", "hunter2")).await.unwrap();
        assert!(matches!(
            pipeline.submit(&request("alice", "wrong")).await,
            Err(SubmitError::Forbidden)
        ));

        assert!(pipeline.locks.lock().await.is_empty());
    }
}

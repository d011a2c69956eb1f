use chrono::{DateTime, Utc};

use super::db::{Database, DatabaseError};
use super::files::insert_file_in;
use super::models::{CompletedUpload, CompletionOutcome, FileRecord, PendingUpload};
use super::tables::*;

impl Database {
    // ========================================================================
    // Upload bindings
    // ========================================================================

    /// Record an initiated upload so its completion can be bound to the owner.
    pub fn put_pending_upload(&self, pending: &PendingUpload) -> Result<(), DatabaseError> {
        self.put_pending_uploads(std::slice::from_ref(pending))
    }

    /// Record a batch of initiated uploads; either all bindings are written or none.
    pub fn put_pending_uploads(&self, batch: &[PendingUpload]) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(PENDING_UPLOADS)?;
            for pending in batch {
                let data = rmp_serde::to_vec_named(pending)?;
                table.insert(pending.file_id.as_str(), data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_pending_upload(&self, file_id: &str) -> Result<Option<PendingUpload>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(PENDING_UPLOADS)?;

        match table.get(file_id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Consume the pending upload for `file_id` and insert its file record, in a
    /// single write transaction. Nothing is written unless both steps succeed.
    /// A binding older than `PENDING_UPLOAD_TTL_SECONDS` counts as unknown.
    pub fn complete_upload(
        &self,
        file_id: &str,
        upload: &CompletedUpload,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, DatabaseError> {
        let write_txn = self.begin_write()?;

        let pending: Option<PendingUpload> = {
            let mut table = write_txn.open_table(PENDING_UPLOADS)?;
            let removed = table.remove(file_id)?;
            let result = match removed {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        // Expired bindings are left for the sweeper.
        let Some(pending) = pending.filter(|p| !p.is_expired(now)) else {
            write_txn.abort()?;
            return Ok(CompletionOutcome::UnknownUpload);
        };

        let file = FileRecord {
            id: pending.file_id,
            owner_id: pending.owner_id,
            name: upload.name.clone(),
            size: upload.size,
            content_type: upload
                .content_type
                .clone()
                .or(pending.content_type),
            storage_url: upload.storage_url.clone(),
            created_at: now,
            updated_at: now,
        };

        if !insert_file_in(&write_txn, &file)? {
            write_txn.abort()?;
            return Ok(CompletionOutcome::AlreadyExists);
        }

        write_txn.commit()?;
        Ok(CompletionOutcome::Created(file))
    }
}

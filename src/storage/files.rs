use chrono::{DateTime, Duration, Utc};
use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::{FileKind, FileRecord, FileStats};
use super::tables::*;

/// Window counted as "recent" in owner statistics
const RECENT_WINDOW_DAYS: i64 = 7;

/// Insert a file record and its owner index entry inside an open write transaction.
/// Returns false without touching anything if the id is already taken.
pub(super) fn insert_file_in(
    write_txn: &WriteTransaction,
    file: &FileRecord,
) -> Result<bool, DatabaseError> {
    debug_assert!(!file.id.is_empty(), "file id must not be empty");
    debug_assert!(!file.owner_id.is_empty(), "file owner must not be empty");

    let mut table = write_txn.open_table(FILES)?;
    if table.get(file.id.as_str())?.is_some() {
        return Ok(false);
    }
    let data = rmp_serde::to_vec_named(file)?;
    table.insert(file.id.as_str(), data.as_slice())?;

    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
    let mut file_ids: Vec<String> = match owner_table.get(file.owner_id.as_str())? {
        Some(v) => rmp_serde::from_slice(v.value())?,
        None => Vec::new(),
    };
    if !file_ids.contains(&file.id) {
        file_ids.push(file.id.clone());
        let index_data = rmp_serde::to_vec_named(&file_ids)?;
        owner_table.insert(file.owner_id.as_str(), index_data.as_slice())?;
    }

    Ok(true)
}

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Store a new file record. An existing record with the same id is never
    /// overwritten; in that case this returns false.
    pub fn insert_file(&self, file: &FileRecord) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let inserted = insert_file_in(&write_txn, file)?;
        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Get a file by id regardless of owner
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get a file only if it belongs to `owner_id`. Missing and foreign files
    /// both come back as `None`.
    pub fn get_owned_file(
        &self,
        id: &str,
        owner_id: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        Ok(self.get_file(id)?.filter(|f| f.owner_id == owner_id))
    }

    /// All files for an owner, newest first
    pub fn list_owner_files(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        files.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(files)
    }

    /// Delete the file matching both `id` and `owner_id`. Returns false when no
    /// such file exists, including when it exists under another owner.
    pub fn delete_owned_file(&self, id: &str, owner_id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let owned = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    file.owner_id == owner_id
                }
                None => false,
            };
            result
        };

        if !owned {
            write_txn.abort()?;
            return Ok(false);
        }

        {
            let mut table = write_txn.open_table(FILES)?;
            table.remove(id)?;
        }

        let file_ids: Option<Vec<String>> = {
            let owner_table = write_txn.open_table(OWNER_FILES)?;
            let result = match owner_table.get(owner_id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        if let Some(mut ids) = file_ids {
            ids.retain(|fid| fid != id);
            let mut owner_table = write_txn.open_table(OWNER_FILES)?;
            if ids.is_empty() {
                owner_table.remove(owner_id)?;
            } else {
                let data = rmp_serde::to_vec_named(&ids)?;
                owner_table.insert(owner_id, data.as_slice())?;
            }
        }

        write_txn.commit()?;
        Ok(true)
    }

    /// Storage overview for one owner
    pub fn owner_stats(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FileStats, DatabaseError> {
        let files = self.list_owner_files(owner_id)?;
        let recent_cutoff = now - Duration::days(RECENT_WINDOW_DAYS);

        let mut stats = FileStats::default();
        for file in &files {
            stats.total_files += 1;
            stats.total_bytes += file.size;
            match file.kind() {
                FileKind::Image => stats.images += 1,
                FileKind::Text => stats.text += 1,
                FileKind::Other => stats.other += 1,
            }
            if file.created_at > recent_cutoff {
                stats.recent += 1;
            }
        }

        Ok(stats)
    }
}

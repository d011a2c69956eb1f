use chrono::{DateTime, Utc};

use super::db::{Database, DatabaseError};
use super::models::Session;
use super::tables::*;

impl Database {
    // ========================================================================
    // Session operations
    // ========================================================================

    pub fn put_session(&self, session: &Session) -> Result<(), DatabaseError> {
        debug_assert!(!session.id.is_empty(), "session id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let data = rmp_serde::to_vec_named(session)?;
            table.insert(session.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a live session. Expired sessions are removed and reported as absent.
    pub fn get_session(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, DatabaseError> {
        let session: Option<Session> = {
            let read_txn = self.begin_read()?;
            let table = read_txn.open_table(SESSIONS)?;
            let result = match table.get(id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        match session {
            Some(s) if s.is_expired(now) => {
                self.delete_session(id)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub fn delete_session(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

use redb::TableDefinition;

/// File records: file id -> FileRecord (msgpack)
pub const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// Owner index: owner id -> msgpack Vec of file ids
pub const OWNER_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("owner_files");

/// Initiated but not yet completed uploads: file id -> PendingUpload (msgpack)
pub const PENDING_UPLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("pending_uploads");

/// Sessions: opaque session id -> Session (msgpack)
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

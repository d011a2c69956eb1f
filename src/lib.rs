//! filebox - authenticated small-file uploads with owner-scoped file records
//!
//! This crate provides:
//! - OpenID Connect login with server-side sessions keyed by an opaque cookie
//! - Direct-to-provider uploads bound to their owner at initiation
//! - Signed, time-boxed access URLs for stored objects
//! - redb embedded database for file records (ACID, MVCC, crash-safe)

pub mod api;
pub mod config;
pub mod housekeeping;
pub mod identity;
pub mod storage;
pub mod testutil;
pub mod upload_service;

use std::sync::Arc;

use config::Config;
use identity::IdentityProvider;
use storage::Database;
use upload_service::UploadService;

/// Shared application state. Every service handle is constructed once at
/// startup and injected here.
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub identity: Arc<dyn IdentityProvider>,
    pub uploads: Arc<dyn UploadService>,
}

mod auth;
mod files;
mod health;
mod uploads;

pub use auth::{callback, current_session, login, logout};
pub use files::{delete_file, file_stats, get_file, list_files, FileDetailResponse, FileResponse};
pub use health::health;
pub use uploads::{
    initiate_upload, upload_callback, InitiatedUpload, ALLOWED_CONTENT_TYPES, SIGNATURE_HEADER,
};

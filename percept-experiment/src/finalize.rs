use thiserror::Error;
use tracing::{info, warn};

use crate::record::SessionRecord;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload transport failed: {0}")]
    Transport(String),
    #[error("upload rejected with HTTP status {0}")]
    Status(u16),
}

/// Delivers the finished session to the backend.
pub trait Uploader {
    fn upload(&self, record: &SessionRecord) -> Result<(), UploadError>;
}

/// Takes over once the session is done.
pub trait Navigator {
    fn navigate(&mut self, route: &str);
}

/// Runs the exit effects of a finished session: upload, then navigation. Upload
/// failures are logged and never hold up navigation.
pub struct Finalizer {
    uploader: Box<dyn Uploader>,
    navigator: Box<dyn Navigator>,
    route: String,
}

impl Finalizer {
    pub fn new(uploader: Box<dyn Uploader>, navigator: Box<dyn Navigator>, route: impl Into<String>) -> Self {
        Self {
            uploader,
            navigator,
            route: route.into(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn finish(&mut self, record: &SessionRecord) {
        match self.uploader.upload(record) {
            Ok(()) => info!(participant = %record.participant_id, "session uploaded"),
            Err(err) => warn!(
                participant = %record.participant_id,
                error = %err,
                "session upload failed; local copy kept"
            ),
        }
        self.navigator.navigate(&self.route);
    }
}

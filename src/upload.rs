use percept_experiment::{SessionRecord, UploadError, Uploader};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, info};

/// POSTs the finished session as JSON.
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, record: &SessionRecord) -> Result<(), UploadError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .map_err(|err| UploadError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status.as_u16()));
        }
        debug!(endpoint = %self.endpoint, %status, "upload accepted");
        Ok(())
    }
}

/// Keeps results local only.
pub struct LocalOnly;

impl Uploader for LocalOnly {
    fn upload(&self, record: &SessionRecord) -> Result<(), UploadError> {
        info!(participant = %record.participant_id, "upload disabled, results kept locally");
        Ok(())
    }
}

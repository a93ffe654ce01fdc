use crate::config::{
    ALLOWED_EXTENSIONS, ALLOWED_TYPES, GROUPS_GENERATED, HEALTH_CHECK_PASSED, HEALTH_ENDPOINT,
    MAX_FILE_SIZE, UPLOAD_ENDPOINT,
};
use crate::constraints::ConstraintSpec;
use crate::data::{GroupingResult, HealthStatus, UploadOutcome};
use crate::error::UploadError;
use crate::locator::ServiceLocator;
use bytes::Bytes;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Shown when nothing more specific is known about a failed upload.
pub const FILE_UPLOAD_ERROR: &str = "Failed to upload file. Please try again.";

#[derive(Debug, Clone)]
enum FileBody {
    Bytes(Bytes),
    Path(PathBuf),
}

/// A roster file picked for upload. Contents stay on disk until sent.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    media_type: String,
    size: u64,
    body: FileBody,
}

impl UploadFile {
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            body: FileBody::Bytes(bytes),
        }
    }

    /// Takes name and size from the filesystem and guesses the media type
    /// from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let media_type = match extension_of(&name).as_str() {
            ".csv" => "text/csv",
            _ => "application/octet-stream",
        };
        Ok(Self {
            name,
            media_type: media_type.to_string(),
            size,
            body: FileBody::Path(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Lower-cased extension with its leading dot.
    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }

    // cloning `Bytes` shares the buffer
    async fn contents(&self) -> std::io::Result<Bytes> {
        match &self.body {
            FileBody::Bytes(bytes) => Ok(bytes.clone()),
            FileBody::Path(path) => tokio::fs::read(path).await.map(Bytes::from),
        }
    }
}

// "" when the name has no dot
fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext.to_lowercase()),
        None => String::new(),
    }
}

/// The four local checks, in order. Nothing touches the network before
/// these pass.
pub fn check_file(file: Option<&UploadFile>) -> Result<&UploadFile, UploadError> {
    let file = file.ok_or(UploadError::MissingFile)?;

    if file.size > MAX_FILE_SIZE {
        return Err(UploadError::FileTooLarge { size: file.size });
    }

    if !ALLOWED_TYPES.contains(&file.media_type.as_str()) {
        return Err(UploadError::InvalidMediaType(file.media_type.clone()));
    }

    if !ALLOWED_EXTENSIONS.contains(&file.extension().as_str()) {
        return Err(UploadError::InvalidExtension(file.name.clone()));
    }

    Ok(file)
}

/// Picks the most specific message available for a failed request: the
/// backend's `error` field, then any body it sent, then the transport's own
/// message, then a generic one.
pub fn error_message(body: Option<&str>, transport: Option<&str>) -> String {
    if let Some(body) = body.filter(|b| !b.trim().is_empty()) {
        return match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => {
                let error = map
                    .get("error")
                    .and_then(Value::as_str)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string);
                error.unwrap_or_else(|| Value::Object(map).to_string())
            }
            Ok(Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(_) => body.to_string(),
        };
    }

    transport
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FILE_UPLOAD_ERROR.to_string())
}

fn build_form(file: &UploadFile, contents: Bytes, fields: &[(String, String)]) -> Result<Form, UploadError> {
    let length = contents.len() as u64;
    let mut part = Part::stream_with_length(contents, length).file_name(file.name.clone());
    // ".csv" is an accepted marker but not a mime type
    if file.media_type.contains('/') {
        part = part
            .mime_str(&file.media_type)
            .map_err(|e| UploadError::Request(e.to_string()))?;
    }

    let mut form = Form::new().part("file", part);
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }
    Ok(form)
}

/// Sends rosters and constraints to the backend.
#[derive(Debug)]
pub struct UploadTransport {
    locator: ServiceLocator,
    client: Client,
}

impl UploadTransport {
    pub fn new(locator: ServiceLocator) -> Self {
        Self {
            locator,
            client: Client::new(),
        }
    }

    pub fn locator(&self) -> &ServiceLocator {
        &self.locator
    }

    /// Checks the file, then posts it with the constraint fields as one
    /// multipart request.
    ///
    /// Only connection failures are retried, up to the location's
    /// `max_retries`, since those never reached the backend. Anything the
    /// backend answered is final.
    pub async fn submit(
        &self,
        file: Option<&UploadFile>,
        spec: &ConstraintSpec,
    ) -> Result<UploadOutcome, UploadError> {
        let file = check_file(file)?;
        let contents = file.contents().await?;
        let fields = spec.form_fields()?;

        let location = self.locator.locate().await;
        let url = location.url(UPLOAD_ENDPOINT);
        info!("Uploading {} ({} bytes) to {}", file.name, file.size, url);
        for (name, value) in &fields {
            debug!("{name}: {value}");
        }

        let mut attempt = 0;
        let response = loop {
            let form = build_form(file, contents.clone(), &fields)?;
            let sent = self
                .client
                .post(&url)
                .header(ACCEPT, "application/json")
                .timeout(location.timeout())
                .multipart(form)
                .send()
                .await;

            match sent {
                Ok(response) => break response,
                Err(e) if e.is_connect() && attempt < location.max_retries => {
                    attempt += 1;
                    warn!(
                        "Could not connect to {} ({e}); retry {}/{}",
                        url, attempt, location.max_retries
                    );
                    tokio::time::sleep(location.retry_delay()).await;
                }
                Err(e) => {
                    warn!("Upload to {url} failed: {e}");
                    return Err(UploadError::Request(error_message(None, Some(&e.to_string()))));
                }
            }
        };

        let result = read_result(response).await?;
        info!(
            "Received {} groups covering {} students",
            result.groups().len(),
            result.student_count()
        );
        Ok(UploadOutcome {
            success: true,
            message: GROUPS_GENERATED.to_string(),
            data: result,
        })
    }

    pub async fn check_health(&self) -> Result<HealthStatus, UploadError> {
        let location = self.locator.locate().await;
        let url = location.url(HEALTH_ENDPOINT);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .timeout(location.timeout())
            .send()
            .await
            .map_err(|e| {
                debug!("health check on {url} failed: {e}");
                UploadError::BackendUnavailable
            })?;

        if !response.status().is_success() {
            debug!("health check on {url} answered {}", response.status());
            return Err(UploadError::BackendUnavailable);
        }

        let text = response
            .text()
            .await
            .map_err(|_| UploadError::BackendUnavailable)?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(HealthStatus {
            success: true,
            message: HEALTH_CHECK_PASSED.to_string(),
            data,
        })
    }
}

async fn read_result(response: Response) -> Result<GroupingResult, UploadError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| UploadError::Request(error_message(None, Some(&e.to_string()))))?;

    if !status.is_success() {
        warn!("Backend answered {status}");
        let transport = format!("Request failed with status code {}", status.as_u16());
        return Err(UploadError::Request(error_message(Some(&body), Some(&transport))));
    }

    match serde_json::from_str::<GroupingResult>(&body) {
        Ok(GroupingResult::Failed { error }) if error.is_empty() => {
            Err(UploadError::Request(error_message(Some(&body), None)))
        }
        Ok(GroupingResult::Failed { error }) => Err(UploadError::Request(error)),
        Ok(result) => Ok(result),
        Err(e) => Err(UploadError::Request(error_message(Some(&body), Some(&e.to_string())))),
    }
}

use thiserror::Error;

/// Everything that can go wrong between picking a file and getting groups
/// back. The `Display` text is what the user sees.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file selected. Please choose a CSV file to upload.")]
    MissingFile,
    #[error("File is too large. Maximum size is 500MB.")]
    FileTooLarge { size: u64 },
    #[error("Invalid file format '{0}'. Please upload a CSV file.")]
    InvalidMediaType(String),
    #[error("Invalid file extension on '{0}'. Please upload a .csv file.")]
    InvalidExtension(String),
    #[error("Could not read the selected file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not encode the constraints: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Backend service is unavailable. Please make sure the backend is running.")]
    BackendUnavailable,
    /// Transport or backend failure, already reduced to the most specific
    /// message available.
    #[error("{0}")]
    Request(String),
}

impl UploadError {
    /// True for failures caught before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            UploadError::MissingFile
                | UploadError::FileTooLarge { .. }
                | UploadError::InvalidMediaType(_)
                | UploadError::InvalidExtension(_)
                | UploadError::Io(_)
                | UploadError::Encode(_)
        )
    }
}

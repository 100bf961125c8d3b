//! Configuration of the [`BodyHandler`](crate::handler::BodyHandler).
//!
//! The options can be set with the chainable setters or loaded from json, using the
//! camelCase option names:
//!
//! ```
//! use micro_body::BodyHandlerConfig;
//!
//! let config = BodyHandlerConfig::from_json(r#"{ "bodyLimit": 1048576, "deleteUploadedFilesOnEnd": true }"#).unwrap();
//! assert_eq!(config.body_limit(), Some(1048576));
//! assert!(config.delete_uploaded_files_on_end());
//! ```

use std::path::{Path, PathBuf};

use http::StatusCode;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::ensure;
use crate::protocol::ConfigError;

pub const DEFAULT_UPLOADS_DIRECTORY: &str = "file-uploads";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyHandlerConfig {
    /// maximum number of body bytes, `None` means unlimited
    #[serde(deserialize_with = "deserialize_body_limit")]
    body_limit: Option<u64>,
    handle_file_uploads: bool,
    uploads_directory: PathBuf,
    merge_form_attributes: bool,
    delete_uploaded_files_on_end: bool,
    preallocate_body_buffer: bool,
    #[serde(deserialize_with = "deserialize_status")]
    unclassified_failure_status: StatusCode,
}

impl Default for BodyHandlerConfig {
    fn default() -> Self {
        Self {
            body_limit: None,
            handle_file_uploads: true,
            uploads_directory: PathBuf::from(DEFAULT_UPLOADS_DIRECTORY),
            merge_form_attributes: true,
            delete_uploaded_files_on_end: false,
            preallocate_body_buffer: false,
            unclassified_failure_status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl BodyHandlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from json, missing options keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BodyHandlerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.handle_file_uploads || !self.uploads_directory.as_os_str().is_empty(),
            ConfigError::MissingUploadsDirectory
        );
        Ok(())
    }

    /// Requests whose body exceeds `limit` bytes are rejected with `413 Payload Too Large`.
    pub fn set_body_limit(mut self, limit: Option<u64>) -> Self {
        self.body_limit = limit;
        self
    }

    /// Streams multipart file parts to the uploads directory, otherwise their data is dropped.
    pub fn set_handle_file_uploads(mut self, handle_file_uploads: bool) -> Self {
        self.handle_file_uploads = handle_file_uploads;
        self
    }

    pub fn set_uploads_directory<P: Into<PathBuf>>(mut self, uploads_directory: P) -> Self {
        self.uploads_directory = uploads_directory.into();
        self
    }

    /// Merges decoded form attributes into the request parameters.
    pub fn set_merge_form_attributes(mut self, merge_form_attributes: bool) -> Self {
        self.merge_form_attributes = merge_form_attributes;
        self
    }

    /// Deletes the uploaded files once the response has been sent.
    pub fn set_delete_uploaded_files_on_end(mut self, delete_uploaded_files_on_end: bool) -> Self {
        self.delete_uploaded_files_on_end = delete_uploaded_files_on_end;
        self
    }

    /// Sizes the body buffer from the `Content-Length` header.
    pub fn set_preallocate_body_buffer(mut self, preallocate_body_buffer: bool) -> Self {
        self.preallocate_body_buffer = preallocate_body_buffer;
        self
    }

    /// Status used when the dispatcher fails with an unclassified error or panics.
    pub fn set_unclassified_failure_status(mut self, status: StatusCode) -> Self {
        self.unclassified_failure_status = status;
        self
    }

    pub fn body_limit(&self) -> Option<u64> {
        self.body_limit
    }

    pub fn handle_file_uploads(&self) -> bool {
        self.handle_file_uploads
    }

    pub fn uploads_directory(&self) -> &Path {
        &self.uploads_directory
    }

    pub fn merge_form_attributes(&self) -> bool {
        self.merge_form_attributes
    }

    pub fn delete_uploaded_files_on_end(&self) -> bool {
        self.delete_uploaded_files_on_end
    }

    pub fn preallocate_body_buffer(&self) -> bool {
        self.preallocate_body_buffer
    }

    pub fn unclassified_failure_status(&self) -> StatusCode {
        self.unclassified_failure_status
    }
}

/// `-1` (or any negative value) and `null` mean unlimited
fn deserialize_body_limit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let limit = Option::<i64>::deserialize(deserializer)?;
    Ok(limit.and_then(|limit| u64::try_from(limit).ok()))
}

fn deserialize_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatusCode, D::Error> {
    let code = u16::deserialize(deserializer)?;
    StatusCode::from_u16(code).map_err(|e| D::Error::custom(format!("invalid status code {code}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_defaults() {
        let config = BodyHandlerConfig::default();

        assert_eq!(config.body_limit(), None);
        assert!(config.handle_file_uploads());
        assert_eq!(config.uploads_directory(), Path::new(DEFAULT_UPLOADS_DIRECTORY));
        assert!(config.merge_form_attributes());
        assert!(!config.delete_uploaded_files_on_end());
        assert!(!config.preallocate_body_buffer());
        assert_eq!(config.unclassified_failure_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_from_json() {
        let json = indoc! {r#"
        {
            "bodyLimit": 10,
            "handleFileUploads": true,
            "uploadsDirectory": "/var/tmp/uploads",
            "mergeFormAttributes": false,
            "deleteUploadedFilesOnEnd": true,
            "preallocateBodyBuffer": true,
            "unclassifiedFailureStatus": 401
        }
        "#};

        let config = BodyHandlerConfig::from_json(json).unwrap();

        let expected = BodyHandlerConfig::new()
            .set_body_limit(Some(10))
            .set_handle_file_uploads(true)
            .set_uploads_directory("/var/tmp/uploads")
            .set_merge_form_attributes(false)
            .set_delete_uploaded_files_on_end(true)
            .set_preallocate_body_buffer(true)
            .set_unclassified_failure_status(StatusCode::UNAUTHORIZED);
        assert_eq!(config, expected);
    }

    #[test]
    fn test_negative_limit_is_unlimited() {
        let config = BodyHandlerConfig::from_json(r#"{ "bodyLimit": -1 }"#).unwrap();
        assert_eq!(config.body_limit(), None);

        let config = BodyHandlerConfig::from_json(r#"{ "bodyLimit": null }"#).unwrap();
        assert_eq!(config.body_limit(), None);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            BodyHandlerConfig::from_json(r#"{ "unclassifiedFailureStatus": 1000 }"#),
            Err(ConfigError::Json { .. })
        ));
        assert!(matches!(
            BodyHandlerConfig::from_json(r#"{ "uploadsDirectory": "" }"#),
            Err(ConfigError::MissingUploadsDirectory)
        ));
    }
}

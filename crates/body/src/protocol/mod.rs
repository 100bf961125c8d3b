//! Types shared by the decoder, the ingestion pipeline and the dispatch bridge.
//!
//! - [`ContentKind`]: classification of the request body by `Content-Type`
//! - [`Params`]: ordered multimap of query parameters and form attributes
//! - [`FileUpload`]: descriptor of one multipart file streamed to disk
//! - Error types: [`BodyError`] for ingestion failures, [`MultipartError`] for
//!   malformed multipart payloads, [`DispatchError`] for dispatcher failures and
//!   [`ConfigError`] for invalid configuration

mod content;
pub use content::ContentKind;

mod params;
pub use params::Params;

mod upload;
pub use upload::FileUpload;
pub use upload::UploadState;

mod error;
pub use error::BodyError;
pub use error::BoxError;
pub use error::ConfigError;
pub use error::DispatchError;
pub use error::MultipartError;

//! Request body buffering and the response body handed back to the transport.
//!
//! - [`initial_capacity`]: sizes the body buffer from the `Content-Length` header
//! - [`BodyAccumulator`]: enforces the body limit while chunks arrive
//! - [`FailureFlag`]: the exchange-wide failure latch shared with the upload tasks
//! - [`ResponseBody`]: `http_body::Body` implementation with an optional end hook

mod accumulator;
pub use accumulator::BodyAccumulator;
pub use accumulator::Ingest;

mod failure;
pub use failure::FailureFlag;

mod length;
pub use length::declared_content_length;
pub use length::initial_capacity;
pub use length::DEFAULT_INITIAL_BODY_BUFFER_SIZE;
pub use length::MAX_PREALLOCATED_BODY_BUFFER_BYTES;

mod response;
pub use response::ResponseBody;

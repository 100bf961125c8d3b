//! Request body aggregation and dispatch bridging for asynchronous HTTP servers
//!
//! This crate sits between an asynchronous transport, anything that yields an
//! [`http::Request`] whose body implements [`http_body::Body`], and a synchronous
//! request dispatcher. It reads the request body under a size limit, streams
//! `multipart/form-data` file parts to disk while keeping track of the running
//! uploads, and hands the fully ingested request to the dispatcher exactly once.
//!
//! # Features
//!
//! - Body buffering with a configurable limit, answered with `413 Payload Too Large`
//! - Streaming multipart decoding, files are written to disk as they arrive
//! - Url encoded and multipart form attributes, optionally merged into the query parameters
//! - Reroute support: an exchange is read once, later passes reuse what was collected
//! - Uploaded files are deleted exactly once, on failure or when the response ends
//! - Suspended responses completed later from any thread
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use http_body_util::Full;
//! use micro_body::{BodyHandler, BodyHandlerConfig, DispatchError, DispatchRequest, DispatchResponse, Exchange, Flow};
//!
//! fn echo(request: &DispatchRequest, response: &mut DispatchResponse) -> Result<(), DispatchError> {
//!     response.write(request.body());
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BodyHandlerConfig::default().set_body_limit(Some(1024 * 1024));
//!     let handler = BodyHandler::new(config, echo);
//!
//!     let request = Request::post("/echo").body(Full::new(Bytes::from("hello"))).unwrap();
//!     let mut exchange = Exchange::new(request);
//!
//!     match handler.handle(&mut exchange).await {
//!         Flow::Respond(response) => println!("status {}", response.status()),
//!         Flow::Suspended(suspended) => println!("status {}", suspended.await.status()),
//!         Flow::Next => println!("passed to the next handler"),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: handler options, builder setters and json loading
//! - [`protocol`]: shared types and errors
//! - [`codec`]: the streaming multipart decoder
//! - [`body`]: body limit accounting and the response body type
//! - [`upload`]: upload tracking, writer tasks and file cleanup
//! - [`dispatch`]: the dispatcher boundary
//! - [`handler`]: the body handler and the exchange it works on

pub mod body;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod handler;
pub mod protocol;
pub mod upload;

mod utils;
pub(crate) use utils::ensure;

pub use body::ResponseBody;
pub use config::BodyHandlerConfig;
pub use dispatch::{DispatchRequest, DispatchResponse, Dispatcher, ResponseCompleter, SuspendedResponse};
pub use handler::{BodyHandler, Exchange, ExchangeState, Flow};
pub use protocol::{BodyError, DispatchError, FileUpload, Params};

//! Multipart codec module for decoding `multipart/form-data` request bodies
//!
//! This module provides streaming decoding of multipart payloads. It uses the same
//! state machine pattern as `tokio_util` decoders: callers append incoming body
//! chunks to a [`bytes::BytesMut`] buffer and drain items until more data is needed.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_body::codec::{MultipartDecoder, MultipartItem};
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = MultipartDecoder::from_content_type("multipart/form-data; boundary=b").unwrap();
//! let mut buffer = BytesMut::from("--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n--b--");
//!
//! let mut items = Vec::new();
//! while let Some(item) = decoder.decode(&mut buffer).unwrap() {
//!     items.push(item);
//! }
//! assert_eq!(items.last(), Some(&MultipartItem::Eof));
//! ```

mod multipart_decoder;
mod part_header;

pub use multipart_decoder::boundary_from_content_type;
pub use multipart_decoder::MultipartDecoder;
pub use multipart_decoder::MultipartItem;
pub use part_header::PartHeader;

//! Decoder implementation for `multipart/form-data` request bodies.
//!
//! This module provides functionality to decode multipart payloads as described in
//! [RFC 7578](https://tools.ietf.org/html/rfc7578) incrementally, as body chunks arrive
//! from the network. Part data is emitted as soon as it can no longer be the start of
//! the next delimiter, so file parts stream through without being buffered.

use bytes::{Buf, Bytes, BytesMut};
use mime::Mime;
use tokio_util::codec::Decoder;
use tracing::trace;
use MultipartState::*;

use crate::codec::PartHeader;
use crate::ensure;
use crate::protocol::MultipartError;

const MAX_PART_HEADER_SIZE: usize = 8 * 1024;
const MAX_PART_HEADERS: usize = 16;
const MAX_BOUNDARY_LEN: usize = 70;

/// An item produced by the [`MultipartDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartItem {
    /// A new part starts with the given headers
    PartStart(PartHeader),
    /// A piece of the current part's data
    Data(Bytes),
    /// The current part is complete
    PartEnd,
    /// The closing delimiter was read, anything after it is epilogue
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultipartState {
    /// Skip everything up to the first dash-boundary
    Preamble,
    /// Read `--` (close delimiter) or CRLF after a boundary
    BoundaryTail,
    /// Read the header block of a part
    Headers,
    /// Read part data up to the next delimiter
    Body,
    /// Closing delimiter was read
    End,
}

/// A streaming decoder for `multipart/form-data` bodies.
///
/// The decoder processes incoming bytes according to the multipart format:
/// - An optional preamble, followed by `--boundary`
/// - For every part: CRLF, a header block terminated by an empty line, then the data
/// - Each part's data ends with `CRLF--boundary`
/// - The closing delimiter `--boundary--` ends the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartDecoder {
    /// `\r\n--boundary`, the dash-boundary is this without the leading CRLF
    delimiter: Bytes,
    state: MultipartState,
}

impl MultipartDecoder {
    /// Creates a new decoder for the given boundary, without the leading dashes.
    pub fn new(boundary: &str) -> Self {
        let mut delimiter = BytesMut::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self { delimiter: delimiter.freeze(), state: Preamble }
    }

    /// Creates a decoder from a `multipart/form-data; boundary=...` content type.
    pub fn from_content_type(content_type: &str) -> Result<Self, MultipartError> {
        let boundary = boundary_from_content_type(content_type)?;
        Ok(Self::new(&boundary))
    }

    /// Returns true once the closing delimiter has been decoded
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state == End
    }
}

/// Extracts the boundary parameter of a multipart content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let mime = content_type.parse::<Mime>().map_err(MultipartError::invalid_boundary)?;
    ensure!(mime.type_() == mime::MULTIPART, MultipartError::invalid_boundary("content type is not multipart"));

    let boundary = mime.get_param(mime::BOUNDARY).ok_or(MultipartError::MissingBoundary)?;
    let boundary = boundary.as_str().trim_matches('"');
    ensure!(!boundary.is_empty(), MultipartError::MissingBoundary);
    ensure!(
        boundary.len() <= MAX_BOUNDARY_LEN,
        MultipartError::invalid_boundary(format!("boundary longer than {MAX_BOUNDARY_LEN} bytes"))
    );

    Ok(boundary.to_string())
}

impl Decoder for MultipartDecoder {
    type Item = MultipartItem;
    type Error = MultipartError;

    /// Decodes the next multipart item from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(item))` when a part starts, data is available, a part ends or the body is closed
    /// - `Ok(None)` when more data is needed
    /// - `Err(MultipartError)` if the payload is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                Preamble => {
                    let dash_boundary = &self.delimiter[2..];
                    match find(&src[..], dash_boundary) {
                        Some(index) => {
                            src.advance(index + dash_boundary.len());
                            self.state = BoundaryTail;
                        }
                        None => {
                            // keep a tail which may be the start of a split dash-boundary
                            let keep = dash_boundary.len() - 1;
                            if src.len() > keep {
                                src.advance(src.len() - keep);
                            }
                            return Ok(None);
                        }
                    }
                }

                BoundaryTail => {
                    // transport padding
                    while src.first().is_some_and(|b| *b == b' ' || *b == b'\t') {
                        src.advance(1);
                    }

                    if src.len() < 2 {
                        return Ok(None);
                    }

                    if src.starts_with(b"--") {
                        src.advance(2);
                        self.state = End;
                        trace!("finished reading multipart body");
                        return Ok(Some(MultipartItem::Eof));
                    }

                    ensure!(src.starts_with(b"\r\n"), MultipartError::invalid_boundary("expected CRLF after boundary"));
                    src.advance(2);
                    self.state = Headers;
                }

                Headers => {
                    let mut headers = [httparse::EMPTY_HEADER; MAX_PART_HEADERS];
                    match httparse::parse_headers(&src[..], &mut headers) {
                        Ok(httparse::Status::Complete((consumed, parsed))) => {
                            let part_header = PartHeader::parse(parsed)?;
                            src.advance(consumed);
                            self.state = Body;
                            trace!(name = part_header.name(), "read multipart part header");
                            return Ok(Some(MultipartItem::PartStart(part_header)));
                        }
                        Ok(httparse::Status::Partial) => {
                            ensure!(
                                src.len() <= MAX_PART_HEADER_SIZE,
                                MultipartError::too_large_part_header(src.len(), MAX_PART_HEADER_SIZE)
                            );
                            return Ok(None);
                        }
                        Err(e) => return Err(MultipartError::invalid_part_header(e)),
                    }
                }

                Body => {
                    return match find(&src[..], &self.delimiter) {
                        Some(0) => {
                            src.advance(self.delimiter.len());
                            self.state = BoundaryTail;
                            Ok(Some(MultipartItem::PartEnd))
                        }
                        Some(index) => Ok(Some(MultipartItem::Data(src.split_to(index).freeze()))),
                        None => {
                            let keep = self.delimiter.len() - 1;
                            if src.len() > keep {
                                let len = src.len() - keep;
                                trace!(len, "read multipart part bytes");
                                Ok(Some(MultipartItem::Data(src.split_to(len).freeze())))
                            } else {
                                Ok(None)
                            }
                        }
                    };
                }

                End => {
                    // epilogue
                    src.clear();
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None if self.state == End => Ok(None),
            None => Err(MultipartError::UnexpectedEof),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = concat!(
        "this is the preamble\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n",
        "\r\n",
        "hello world\r\n",
        "--XyZ\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "line one\r\nline two --XyZ not a delimiter\r\n",
        "--XyZ--\r\n",
        "this is the epilogue",
    );

    /// decodes all chunks, merging adjacent data items
    fn decode_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Vec<MultipartItem> {
        let mut decoder = MultipartDecoder::new("XyZ");
        let mut buffer = BytesMut::new();
        let mut items: Vec<MultipartItem> = Vec::new();

        for chunk in chunks {
            buffer.extend_from_slice(chunk);
            while let Some(item) = decoder.decode(&mut buffer).unwrap() {
                push(&mut items, item);
            }
        }
        while let Some(item) = decoder.decode_eof(&mut buffer).unwrap() {
            push(&mut items, item);
        }

        assert!(decoder.is_finished());
        items
    }

    fn push(items: &mut Vec<MultipartItem>, item: MultipartItem) {
        if let MultipartItem::Data(bytes) = &item {
            if let Some(MultipartItem::Data(previous)) = items.last_mut() {
                let mut merged = BytesMut::from(&previous[..]);
                merged.extend_from_slice(bytes);
                *previous = merged.freeze();
                return;
            }
        }
        items.push(item);
    }

    fn expected_items() -> Vec<MultipartItem> {
        let title = PartHeader::parse(&[httparse::Header {
            name: "Content-Disposition",
            value: b"form-data; name=\"title\"",
        }])
        .unwrap();
        let file = PartHeader::parse(&[
            httparse::Header { name: "Content-Disposition", value: b"form-data; name=\"file\"; filename=\"a.txt\"" },
            httparse::Header { name: "Content-Type", value: b"text/plain" },
        ])
        .unwrap();

        vec![
            MultipartItem::PartStart(title),
            MultipartItem::Data(Bytes::from_static(b"hello world")),
            MultipartItem::PartEnd,
            MultipartItem::PartStart(file),
            MultipartItem::Data(Bytes::from_static(b"line one\r\nline two --XyZ not a delimiter")),
            MultipartItem::PartEnd,
            MultipartItem::Eof,
        ]
    }

    #[test]
    fn test_whole_body() {
        let items = decode_chunks([BODY.as_bytes()]);
        assert_eq!(items, expected_items());
    }

    #[test]
    fn test_byte_by_byte() {
        let items = decode_chunks(BODY.as_bytes().chunks(1));
        assert_eq!(items, expected_items());
    }

    #[test]
    fn test_odd_chunks() {
        for size in [2, 3, 5, 7, 13] {
            let items = decode_chunks(BODY.as_bytes().chunks(size));
            assert_eq!(items, expected_items(), "chunk size {size}");
        }
    }

    #[test]
    fn test_empty_part() {
        let body = "--b\r\nContent-Disposition: form-data; name=\"empty\"\r\n\r\n\r\n--b--";
        let mut decoder = MultipartDecoder::new("b");
        let mut buffer = BytesMut::from(body);

        assert!(matches!(decoder.decode(&mut buffer).unwrap(), Some(MultipartItem::PartStart(_))));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(MultipartItem::PartEnd));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), Some(MultipartItem::Eof));
        assert_eq!(decoder.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_unexpected_eof() {
        let mut decoder = MultipartDecoder::new("b");
        let mut buffer = BytesMut::from("--b\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nunterminated");

        while let Some(_item) = decoder.decode(&mut buffer).unwrap() {}

        assert!(matches!(decoder.decode_eof(&mut buffer), Err(MultipartError::UnexpectedEof)));
    }

    #[test]
    fn test_invalid_boundary_tail() {
        let mut decoder = MultipartDecoder::new("b");
        let mut buffer = BytesMut::from("--bXX");

        assert!(matches!(decoder.decode(&mut buffer), Err(MultipartError::InvalidBoundary { .. })));
    }

    #[test]
    fn test_too_large_part_header() {
        let mut decoder = MultipartDecoder::new("b");
        let mut buffer = BytesMut::from("--b\r\nX-Long: ");
        buffer.extend_from_slice(&[b'a'; MAX_PART_HEADER_SIZE + 1]);

        assert!(matches!(decoder.decode(&mut buffer), Err(MultipartError::TooLargePartHeader { .. })));
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary=abc").unwrap(), "abc");
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary=\"a b\"").unwrap(), "a b");
        assert!(matches!(boundary_from_content_type("multipart/form-data"), Err(MultipartError::MissingBoundary)));
        assert!(matches!(
            boundary_from_content_type("application/json; boundary=abc"),
            Err(MultipartError::InvalidBoundary { .. })
        ));
    }
}

//! Content-Type classification of inbound request bodies.

use http::HeaderMap;
use http::header::CONTENT_TYPE;

/// How a request body is ingested, decided once from the `Content-Type` header.
///
/// - `Multipart`: fields are decoded on the fly, files are streamed to disk and
///   nothing is retained in the body buffer
/// - `UrlEncoded`: retained in full and additionally parsed into form attributes
/// - `Other`: retained in full
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Multipart,
    UrlEncoded,
    Other,
}

impl ContentKind {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(ContentKind::Other, ContentKind::from_content_type)
    }

    pub fn from_content_type(content_type: &str) -> Self {
        let lower_case = content_type.trim_start().to_ascii_lowercase();
        if lower_case.starts_with(mime::MULTIPART_FORM_DATA.essence_str()) {
            ContentKind::Multipart
        } else if lower_case.starts_with(mime::APPLICATION_WWW_FORM_URLENCODED.essence_str()) {
            ContentKind::UrlEncoded
        } else {
            ContentKind::Other
        }
    }

    #[inline]
    pub fn is_multipart(&self) -> bool {
        matches!(self, ContentKind::Multipart)
    }

    #[inline]
    pub fn is_url_encoded(&self) -> bool {
        matches!(self, ContentKind::UrlEncoded)
    }

    /// Returns true if the body carries form attributes
    #[inline]
    pub fn expects_form(&self) -> bool {
        matches!(self, ContentKind::Multipart | ContentKind::UrlEncoded)
    }
}

use http::header::CONTENT_LENGTH;
use http::HeaderMap;

use crate::config::BodyHandlerConfig;

/// Buffer size used when the body length is unknown or preallocation is disabled
pub const DEFAULT_INITIAL_BODY_BUFFER_SIZE: usize = 1024;

/// Upper bound of a buffer sized from a client supplied `Content-Length`
pub const MAX_PREALLOCATED_BODY_BUFFER_BYTES: usize = 65535;

/// Parses the `Content-Length` header.
///
/// Missing, empty, negative or otherwise unparseable values are all unknown.
pub fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// Chooses the initial capacity of the body buffer, this never fails.
pub fn initial_capacity(headers: &HeaderMap, config: &BodyHandlerConfig) -> usize {
    let capacity = match declared_content_length(headers) {
        Some(length) if config.preallocate_body_buffer() => {
            usize::try_from(length).map_or(MAX_PREALLOCATED_BODY_BUFFER_BYTES, |length| {
                length.min(MAX_PREALLOCATED_BODY_BUFFER_BYTES)
            })
        }
        _ => DEFAULT_INITIAL_BODY_BUFFER_SIZE,
    };

    match config.body_limit().map(usize::try_from) {
        Some(Ok(limit)) => capacity.min(limit),
        _ => capacity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(content_length: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = content_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn test_preallocation_disabled() {
        let config = BodyHandlerConfig::default();
        assert_eq!(initial_capacity(&headers(Some("4096")), &config), DEFAULT_INITIAL_BODY_BUFFER_SIZE);
    }

    #[test]
    fn test_declared_length() {
        let config = BodyHandlerConfig::default().set_preallocate_body_buffer(true);

        assert_eq!(initial_capacity(&headers(Some("4096")), &config), 4096);
        assert_eq!(initial_capacity(&headers(Some("10000000")), &config), MAX_PREALLOCATED_BODY_BUFFER_BYTES);
        assert_eq!(initial_capacity(&headers(Some("0")), &config), 0);
    }

    #[test]
    fn test_unknown_length() {
        let config = BodyHandlerConfig::default().set_preallocate_body_buffer(true);

        assert_eq!(initial_capacity(&headers(None), &config), DEFAULT_INITIAL_BODY_BUFFER_SIZE);
        assert_eq!(initial_capacity(&headers(Some("")), &config), DEFAULT_INITIAL_BODY_BUFFER_SIZE);
        assert_eq!(initial_capacity(&headers(Some("abc")), &config), DEFAULT_INITIAL_BODY_BUFFER_SIZE);
        assert_eq!(initial_capacity(&headers(Some("-5")), &config), DEFAULT_INITIAL_BODY_BUFFER_SIZE);
    }

    #[test]
    fn test_clamped_by_limit() {
        let config = BodyHandlerConfig::default().set_preallocate_body_buffer(true).set_body_limit(Some(100));
        assert_eq!(initial_capacity(&headers(Some("4096")), &config), 100);

        let config = BodyHandlerConfig::default().set_body_limit(Some(10));
        assert_eq!(initial_capacity(&headers(None), &config), 10);
    }
}

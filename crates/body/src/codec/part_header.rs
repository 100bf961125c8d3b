//! Header block of a single multipart part.

use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};

use crate::protocol::MultipartError;

const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";

/// The parsed headers that open a multipart part.
///
/// Only the headers relevant to routing the part are kept: the field name and
/// optional file name from `Content-Disposition`, the part's `Content-Type`,
/// `Content-Transfer-Encoding` and an optional declared `Content-Length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartHeader {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    transfer_encoding: Option<String>,
    content_length: Option<u64>,
}

impl PartHeader {
    pub(crate) fn parse(headers: &[httparse::Header<'_>]) -> Result<Self, MultipartError> {
        let mut disposition = None;
        let mut content_type = None;
        let mut transfer_encoding = None;
        let mut content_length = None;

        for header in headers {
            let value = std::str::from_utf8(header.value).map_err(MultipartError::invalid_part_header)?.trim();
            if header.name.eq_ignore_ascii_case(CONTENT_DISPOSITION.as_str()) {
                disposition = Some(value);
            } else if header.name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) {
                content_type = Some(value.to_string());
            } else if header.name.eq_ignore_ascii_case(CONTENT_TRANSFER_ENCODING) {
                transfer_encoding = Some(value.to_string());
            } else if header.name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
                content_length = value.parse::<u64>().ok();
            }
        }

        let disposition = disposition.ok_or(MultipartError::MissingContentDisposition)?;
        let (name, file_name) = parse_content_disposition(disposition)?;

        Ok(Self { name, file_name, content_type, transfer_encoding, content_length })
    }

    /// The form field name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn transfer_encoding(&self) -> Option<&str> {
        self.transfer_encoding.as_deref()
    }

    /// The size announced by the part itself, known before any data arrives
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// A part carrying a `filename` parameter is a file upload, anything else is a form attribute
    #[inline]
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }
}

/// Parses `form-data; name="field"; filename="a.txt"` into the name and file name.
fn parse_content_disposition(value: &str) -> Result<(String, Option<String>), MultipartError> {
    let mut name = None;
    let mut file_name = None;

    // the first segment is the disposition type
    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw_value)) = param.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.eq_ignore_ascii_case("name") {
            name = Some(unquote(raw_value));
        } else if key.eq_ignore_ascii_case("filename") {
            file_name = Some(unquote(raw_value));
        }
    }

    let name = name.ok_or_else(|| MultipartError::invalid_part_header("content-disposition without name"))?;
    Ok((name, file_name))
}

/// Splits on `;` outside of quoted strings.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (index, c) in value.char_indices() {
        match c {
            '\\' if quoted && !escaped => {
                escaped = true;
                continue;
            }
            '"' if !escaped => quoted = !quoted,
            ';' if !quoted => {
                params.push(value[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
        escaped = false;
    }

    params.push(value[start..].trim());
    params
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) else {
        return raw.to_string();
    };

    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                unquoted.push(next);
            }
        } else {
            unquoted.push(c);
        }
    }
    unquoted
}

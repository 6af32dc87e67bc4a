//! `multipart/form-data` body parsing.
//!
//! The body is scanned for `\r\n--<boundary>` delimiters and every span
//! between two delimiters is treated as one part. Parts carry a header block
//! and content separated by `\r\n\r\n`; the field name and optional file name
//! come from the `Content-Disposition` line. A segment that does not yield a
//! named field is dropped without failing the whole body.

use crate::http::types;
use memchr::memmem;
use std::collections::HashMap;

/// One field of a `multipart/form-data` body.
///
/// ```text
/// --boundary\r\n
/// Content-Disposition: form-data; name="avatar"; filename="me.png"\r\n
/// Content-Type: image/png\r\n
/// \r\n
/// <content>\r\n
/// --boundary--\r\n
/// ```
///
/// A field with a `filename` attribute is a file upload and keeps its content
/// byte for byte. Any other field is text, decoded as UTF-8 with invalid
/// sequences replaced. Attribute values may be quoted or bare; surrounding
/// quotes are stripped only when present on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    name: String,
    file_name: Option<String>,
    value: PartValue,
}

/// Content of a single [Part].
#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    /// Field content decoded as UTF-8, invalid sequences replaced.
    Text(String),
    /// File upload content, byte for byte as sent.
    File(Vec<u8>),
}

impl Part {
    /// Returns the field name from the `Content-Disposition` line.
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the client-supplied file name, if the field is a file upload.
    #[inline(always)]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// Returns the field content.
    #[inline(always)]
    pub const fn value(&self) -> &PartValue {
        &self.value
    }

    /// Returns the content of a text field, `None` for file uploads.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            PartValue::Text(text) => Some(text),
            PartValue::File(_) => None,
        }
    }

    /// Returns the raw content of a file upload, `None` for text fields.
    #[inline]
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            PartValue::File(bytes) => Some(bytes),
            PartValue::Text(_) => None,
        }
    }
}

/// Splits `body` on `\r\n--<boundary>` and collects the named fields.
///
/// Duplicate field names keep the last part. The closing `--` remnant after
/// the final delimiter never contains another delimiter, so the loop ends
/// there on its own.
pub(crate) fn parse(body: &[u8], boundary: &str) -> HashMap<String, Part> {
    let delimiter = format!("\r\n--{boundary}");
    let finder = memmem::Finder::new(delimiter.as_bytes());

    let mut parts = HashMap::new();
    let mut start = 0;

    while let Some(found) = finder.find(&body[start..]) {
        let segment = &body[start..start + found];
        start += found + delimiter.len();

        if let Some(part) = parse_segment(segment) {
            parts.insert(part.name.clone(), part);
        }
    }

    parts
}

fn parse_segment(segment: &[u8]) -> Option<Part> {
    let headers_end = memmem::find(segment, b"\r\n\r\n")?;
    let content = &segment[headers_end + 4..];

    // Line 0 of a segment is the leftover before the header block: the
    // opening `--boundary` for the first segment, an empty line for every
    // later one. The `Content-Disposition` line is always the second.
    let line = segment[..headers_end].split(|&byte| byte == b'\n').nth(1)?;
    let line = match line {
        [rest @ .., b'\r'] => rest,
        _ => line,
    };
    let disposition = types::lossy_utf8(line.to_vec());

    let mut name = None;
    let mut file_name = None;

    for attr in disposition.split(';') {
        let Some((attr_name, attr_value)) = attr.split_once('=') else {
            continue;
        };

        let attr_name = attr_name.trim();
        let attr_value = unquote(attr_value.trim());

        if attr_name.eq_ignore_ascii_case("name") {
            name = Some(attr_value.to_owned());
        } else if attr_name.eq_ignore_ascii_case("filename") {
            file_name = Some(attr_value.to_owned());
        }
    }

    let value = match &file_name {
        Some(_) => PartValue::File(content.to_vec()),
        None => PartValue::Text(types::lossy_utf8(content.to_vec())),
    };

    Some(Part {
        name: name?,
        file_name,
        value,
    })
}

fn unquote(value: &str) -> &str {
    match value.as_bytes() {
        [b'"', .., b'"'] => &value[1..value.len() - 1],
        _ => value,
    }
}

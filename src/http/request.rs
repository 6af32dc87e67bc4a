use crate::{
    errors::*,
    http::{
        multipart::{self, Part},
        query::{self, Query},
        types,
    },
};
use memchr::memmem;
use std::collections::HashMap;

/// A fully parsed request.
///
/// Built from one raw frame, every field owned. The expected shape:
///
/// ```text
/// [METHOD] SP [TARGET] SP [VERSION] CRLF
/// [NAME]: [VALUE] CRLF
/// ...
/// CRLF
/// [BODY]
/// ```
///
/// #### Request line
/// The first three space-separated tokens become method, target and version.
/// Extra tokens are ignored, fewer than three is an error. The target is
/// percent-decoded as a whole (`+` becomes a space) and only then split on
/// the first `?`, so an encoded `?` moves the path/query boundary.
///
/// #### Headers
/// One `name: value` pair per line, both sides trimmed. Lines without a
/// colon are skipped. A repeated name keeps the last value. A `Cookie`
/// header is additionally unpacked into `name=value` pairs split on `;`,
/// while staying visible as a plain header too.
///
/// #### Body
/// Only `POST` requests carry one (the method check ignores case), picked
/// apart by `Content-Type`: `application/x-www-form-urlencoded` content is
/// merged into the query parameters, `multipart/form-data` is split into
/// [Part]s, anything else stays as text with invalid UTF-8 replaced. Every
/// other method leaves the body [Body::Empty].
#[derive(Debug)]
pub struct Request {
    method: String,
    path: String,
    version: String,
    headers: HashMap<String, String>,
    cookies: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Body,
}

/// Decoded request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// No content: every non-POST request, and POST forms whose fields were
    /// merged into the query parameters.
    Empty,
    /// Content kept as text, with invalid UTF-8 replaced.
    Text(String),
    /// `multipart/form-data` fields keyed by name.
    Multipart(HashMap<String, Part>),
}

impl Request {
    /// Returns the request method, exactly as sent.
    #[inline(always)]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the decoded path, without the query string.
    #[inline(always)]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the protocol version token, exactly as sent.
    #[inline(always)]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns a header value. Names match case-insensitively.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Returns all headers, keyed by their original spelling.
    #[inline(always)]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Returns a cookie value by exact name.
    #[inline]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Returns all cookies.
    #[inline(always)]
    pub const fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    /// Returns a query parameter by exact name. Form fields from an
    /// urlencoded body land here as well.
    #[inline]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Returns all query parameters.
    #[inline(always)]
    pub const fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Returns the request body.
    #[inline(always)]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns one multipart field by name.
    #[inline]
    pub fn part(&self, name: &str) -> Option<&Part> {
        match &self.body {
            Body::Multipart(parts) => parts.get(name),
            _ => None,
        }
    }

    /// Returns the body text for requests that carried plain content.
    #[inline]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

// Parsing
impl Request {
    /// Parses one complete frame into a [Request].
    pub(crate) fn parse(frame: &[u8]) -> Result<Request, ErrorKind> {
        let header_end =
            memmem::find(frame, b"\r\n\r\n").ok_or(ErrorKind::MissingHeaderTerminator)?;
        let head = types::lossy_utf8(frame[..header_end].to_vec());
        let raw_body = &frame[header_end + 4..];

        let mut lines = head.split("\r\n");
        // `split` always yields at least one element
        let request_line = lines.next().unwrap_or_default();

        let (method, path, version, mut query) = Self::parse_request_line(request_line)?;
        let (headers, cookies) = Self::parse_headers(lines);
        let body = Self::parse_body(&method, &headers, &mut query, raw_body)?;

        Ok(Request {
            method,
            path,
            version,
            headers,
            cookies,
            query,
            body,
        })
    }

    fn parse_request_line(
        line: &str,
    ) -> Result<(String, String, String, HashMap<String, String>), ErrorKind> {
        let mut tokens = line.split(' ');

        let (Some(method), Some(target), Some(version)) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(ErrorKind::MalformedRequestLine);
        };

        // Decode first, split after. An encoded `?` therefore becomes a
        // real path/query separator.
        let target = query::percent_decode(target)?;

        let mut params = HashMap::new();
        let path = match target.split_once('?') {
            Some((path, raw_query)) => {
                Query::parse_into(&mut params, raw_query)?;
                path.to_owned()
            }
            None => target,
        };

        Ok((method.to_owned(), path, version.to_owned(), params))
    }

    fn parse_headers<'a, I: Iterator<Item = &'a str>>(
        lines: I,
    ) -> (HashMap<String, String>, HashMap<String, String>) {
        let mut headers = HashMap::new();
        let mut cookies = HashMap::new();

        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };

            let name = name.trim();
            let value = value.trim();

            if name.eq_ignore_ascii_case("cookie") {
                for pair in value.split(';') {
                    let Some((cookie_name, cookie_value)) = pair.split_once('=') else {
                        continue;
                    };

                    cookies
                        .insert(cookie_name.trim().to_owned(), cookie_value.trim().to_owned());
                }
            }

            headers.insert(name.to_owned(), value.to_owned());
        }

        (headers, cookies)
    }

    fn parse_body(
        method: &str,
        headers: &HashMap<String, String>,
        query: &mut HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<Body, ErrorKind> {
        if !method.eq_ignore_ascii_case("POST") {
            return Ok(Body::Empty);
        }

        let content_type = header_lookup(headers, "content-type").unwrap_or_default();

        if content_type.contains("application/x-www-form-urlencoded") {
            let form = types::lossy_utf8(raw_body.to_vec());
            Query::parse_into(query, &form)?;

            return Ok(Body::Empty);
        }

        if content_type.contains("multipart/form-data") {
            let boundary = content_type
                .split_once("boundary=")
                .map(|(_, boundary)| boundary)
                .ok_or(ErrorKind::MultipartBoundaryMissing)?;

            return Ok(Body::Multipart(multipart::parse(raw_body, boundary)));
        }

        Ok(Body::Text(types::lossy_utf8(raw_body.to_vec())))
    }
}

fn header_lookup<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

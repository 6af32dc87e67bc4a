//! Response building and serialization.

use crate::http::types::StatusCode;
use std::collections::HashMap;

/// Response under construction.
///
/// Handlers receive one of these with every request and mutate it through
/// the fluent setters. The server serializes it exactly once after the
/// handler returns.
///
/// Setting a body keeps the `Content-Length` header in sync: any spelling of
/// it already present is dropped and the canonical one is written with the
/// exact byte length. A response that never received a body is serialized
/// without the header.
///
/// # Examples
/// ```
/// use oneshot_web::{Response, StatusCode};
///
/// let mut resp = Response::new();
/// resp.status(StatusCode::Ok)
///     .header("Content-Type", "text/html")
///     .body("<h1>Hello</h1>");
///
/// let raw = resp.to_bytes();
/// assert!(raw.starts_with(b"HTTP/1.1 200 OK\r\n"));
/// assert!(raw.ends_with(b"\r\n\r\n<h1>Hello</h1>"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    version: String,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl Response {
    /// Creates an empty `200 OK` response with no headers and no body.
    #[inline]
    pub fn new() -> Self {
        Self {
            status: StatusCode::Ok,
            version: String::from("HTTP/1.1"),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Sets the status code.
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    /// Replaces the version token of the status line. `HTTP/1.1` by default.
    #[inline]
    pub fn version<V: Into<String>>(&mut self, version: V) -> &mut Self {
        self.version = version.into();
        self
    }

    /// Sets a header, replacing a previous value under the same spelling.
    #[inline]
    pub fn header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) -> &mut Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the body and rewrites `Content-Length` to its exact byte length.
    ///
    /// May be called again; the body and the length header are replaced.
    #[inline]
    pub fn body<T: Into<Vec<u8>>>(&mut self, body: T) -> &mut Self {
        let body = body.into();

        self.headers
            .retain(|name, _| !name.eq_ignore_ascii_case("content-length"));
        self.headers
            .insert(String::from("Content-Length"), body.len().to_string());

        self.body = Some(body);
        self
    }

    /// Renders the response into wire bytes.
    ///
    /// Status line, then one `name: value` line per header in no particular
    /// order, a blank line, and the body if one was set. Pure: calling it
    /// twice yields identical bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let status_line = format!(
            "{} {} {}\r\n",
            self.version,
            self.status.code(),
            self.status.reason()
        );

        let headers_len: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len() + 4)
            .sum();
        let body_len = self.body.as_ref().map_or(0, Vec::len);

        let mut raw = Vec::with_capacity(status_line.len() + headers_len + 2 + body_len);
        raw.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            raw.extend_from_slice(name.as_bytes());
            raw.extend_from_slice(b": ");
            raw.extend_from_slice(value.as_bytes());
            raw.extend_from_slice(b"\r\n");
        }

        raw.extend_from_slice(b"\r\n");

        if let Some(body) = &self.body {
            raw.extend_from_slice(body);
        }

        raw
    }
}

impl Default for Response {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Styled page served when no route matches and when a static file is
/// missing or unreadable.
pub(crate) const NOT_FOUND_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>404 Not Found</title>
    <style>
        body {
            font-family: Arial, sans-serif;
            background-color: #f0f0f0;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
        }
        .container {
            background-color: white;
            padding: 2rem;
            border-radius: 10px;
            box-shadow: 0 0 10px rgba(0,0,0,0.1);
            text-align: center;
        }
        h1 {
            color: #4362d0;
        }
        p {
            color: #34495e;
        }
    </style>
</head>
<body>
    <div class="container">
        <h1>404 Not Found</h1>
        <p>The page you are looking for doesn't exist or has been moved.</p>
        <p>Please check the URL or go back to the <a href="/">homepage</a>.</p>
    </div>
</body>
</html>
"#;

/// Fills `response` with the styled 404 page.
pub(crate) fn not_found(response: &mut Response) {
    response
        .status(StatusCode::NotFound)
        .header("Content-Type", "text/html")
        .body(NOT_FOUND_HTML);
}

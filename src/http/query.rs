//! URL query string parsing with percent-decoding.

use crate::http::types;
use memchr::memchr2;
use std::{collections::HashMap, error, fmt};

/// URL query string parser.
///
/// Splits `key=value` pairs on `&`, percent-decodes the values and collects
/// them into a map. Keys are stored exactly as sent; values have `%XX`
/// escapes and `+` resolved. The same rules cover both the request-line
/// query and `application/x-www-form-urlencoded` bodies.
///
/// # Examples
/// ```rust
/// use oneshot_web::query::Query;
///
/// let params = Query::parse("name=john&age=25&city").unwrap();
/// assert_eq!(params.len(), 3);
/// assert_eq!(params["name"], "john");
/// assert_eq!(params["city"], ""); // no '=' stores an empty value
///
/// // Values are decoded, keys are not
/// let params = Query::parse("email=user%40example.com&q=two+words").unwrap();
/// assert_eq!(params["email"], "user@example.com");
/// assert_eq!(params["q"], "two words");
/// ```
pub struct Query;

impl Query {
    /// Parses a query string into a fresh map.
    ///
    /// Duplicate keys keep the last value.
    ///
    /// # Examples
    /// ```
    /// use oneshot_web::query::Query;
    ///
    /// let params = Query::parse("key=1&key=2").unwrap();
    /// assert_eq!(params.len(), 1);
    /// assert_eq!(params["key"], "2");
    /// ```
    #[inline(always)]
    pub fn parse(query: &str) -> Result<HashMap<String, String>, Error> {
        let mut result = HashMap::new();
        Self::parse_into(&mut result, query)?;
        Ok(result)
    }

    /// Parses a query string into an existing map.
    ///
    /// Lets url-encoded body parameters merge into the map already holding
    /// the request-line parameters.
    ///
    /// # Examples
    /// ```
    /// use oneshot_web::query::Query;
    /// use std::collections::HashMap;
    ///
    /// let mut params = HashMap::new();
    /// Query::parse_into(&mut params, "a=1").unwrap();
    /// Query::parse_into(&mut params, "b=two%20words").unwrap();
    ///
    /// assert_eq!(params.len(), 2);
    /// assert_eq!(params["b"], "two words");
    /// ```
    #[inline]
    pub fn parse_into(
        result: &mut HashMap<String, String>,
        query: &str,
    ) -> Result<(), Error> {
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some((key, value)) => {
                    result.insert(key.to_owned(), percent_decode(value)?);
                }
                None => {
                    result.insert(pair.to_owned(), String::new());
                }
            }
        }

        Ok(())
    }
}

/// Resolves `%XX` escapes and `+` (as space) in `input`.
///
/// Decoded bytes that are not valid UTF-8 are replaced, not rejected; a
/// malformed escape is an [Error::InvalidEscape] carrying its byte offset.
pub(crate) fn percent_decode(input: &str) -> Result<String, Error> {
    let bytes = input.as_bytes();

    // Nothing to decode in the common case
    if memchr2(b'%', b'+', bytes).is_none() {
        return Ok(input.to_owned());
    }

    let mut decoded = Vec::with_capacity(bytes.len());
    let mut position = 0;

    while position < bytes.len() {
        match bytes[position] {
            b'+' => {
                decoded.push(b' ');
                position += 1;
            }
            b'%' => {
                let high = bytes.get(position + 1).and_then(|b| hex_value(*b));
                let low = bytes.get(position + 2).and_then(|b| hex_value(*b));

                match (high, low) {
                    (Some(high), Some(low)) => {
                        decoded.push(high << 4 | low);
                        position += 3;
                    }
                    _ => return Err(Error::InvalidEscape(position)),
                }
            }
            byte => {
                decoded.push(byte);
                position += 1;
            }
        }
    }

    Ok(types::lossy_utf8(decoded))
}

#[inline(always)]
fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Error types that can occur during query parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A `%` escape was truncated or followed by non-hex digits.
    ///
    /// # Fields
    /// - `0`: Byte offset of the `%` within the input
    InvalidEscape(usize),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidEscape(position) => {
                write!(f, "Invalid percent escape at byte {}", position)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        let params = Query::parse("a=1&b=2").unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params["a"], "1");
        assert_eq!(params["b"], "2");
    }

    #[test]
    fn full() {
        let params = Query::parse("flag&empty=&=val&key=value").unwrap();

        assert_eq!(params.len(), 4);
        assert_eq!(params["flag"], "");
        assert_eq!(params["empty"], "");
        assert_eq!(params[""], "val");
        assert_eq!(params["key"], "value");
    }

    #[test]
    fn last_value_wins() {
        let params = Query::parse("key=1&key=2&key=3").unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params["key"], "3");
    }

    #[test]
    fn values_decoded_keys_raw() {
        let params = Query::parse("user%40=x%40y&q=two+words&s=two%20words").unwrap();

        assert_eq!(params["user%40"], "x@y");
        assert_eq!(params["q"], "two words");
        assert_eq!(params["s"], "two words");
        assert!(!params.contains_key("user@"));
    }

    #[test]
    fn multibyte_values() {
        let params = Query::parse("name=%EB%B0%95%EC%9E%AC%EC%84%B1").unwrap();

        assert_eq!(params["name"], "박재성");
    }

    #[test]
    fn invalid_utf8_replaced() {
        let params = Query::parse("b=%FF").unwrap();

        assert_eq!(params["b"], "\u{FFFD}");
    }

    #[test]
    fn bad_escapes() {
        #[rustfmt::skip]
        let cases = [
            ("a=%zz", Error::InvalidEscape(0)),
            ("a=%4",  Error::InvalidEscape(0)),
            ("a=%",   Error::InvalidEscape(0)),
            ("a=b%q", Error::InvalidEscape(1)),
        ];

        for (line, expected) in cases {
            assert_eq!(Query::parse(line), Err(expected), "case: {line}");
        }
    }

    #[test]
    fn decode_passthrough() {
        assert_eq!(percent_decode("plain/path.html").unwrap(), "plain/path.html");
        assert_eq!(percent_decode("").unwrap(), "");
    }
}

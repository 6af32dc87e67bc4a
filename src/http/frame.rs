use crate::{errors::*, http::types, limits::ReqLimits};
use memchr::{memchr, memmem};
use tokio::io::{AsyncRead, AsyncReadExt};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Reads one request frame from `stream`.
///
/// A frame is the byte span of exactly one request: everything up to and
/// including the `\r\n\r\n` header terminator plus, when the headers declare a
/// `Content-Length`, that many body bytes. The stream is read in chunks of
/// [`ReqLimits::read_chunk_size`] and the accumulated bytes are rescanned, so
/// a terminator split across two reads is still found.
///
/// The returned buffer ends exactly at the frame boundary. Bytes past it are
/// never read, and over-read bytes from the final chunk are dropped. A stream
/// that ends before delivering a full frame is an error, as is a frame that
/// would grow past [`ReqLimits::max_request_size`].
pub(crate) async fn read_frame<S: AsyncRead + Unpin>(
    stream: &mut S,
    limits: &ReqLimits,
) -> Result<Vec<u8>, ErrorKind> {
    let finder = memmem::Finder::new(HEADER_TERMINATOR);
    let mut buffer = Vec::with_capacity(limits.read_chunk_size);
    let mut chunk = vec![0; limits.read_chunk_size];
    // `(body_start, frame_end)` once the terminator has been seen.
    let mut bounds = None;

    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(match bounds {
                Some((body_start, frame_end)) => ErrorKind::IncompleteBody {
                    expected: frame_end - body_start,
                    received: buffer.len() - body_start,
                },
                None => ErrorKind::MissingHeaderTerminator,
            });
        }

        buffer.extend_from_slice(&chunk[..read]);

        if bounds.is_none() {
            if let Some(header_end) = finder.find(&buffer) {
                let body_start = header_end + HEADER_TERMINATOR.len();
                let body_len = content_length(&buffer[..header_end])?.unwrap_or(0);
                let frame_end = body_start + body_len;

                if frame_end > limits.max_request_size {
                    return Err(ErrorKind::RequestTooLarge(limits.max_request_size));
                }

                bounds = Some((body_start, frame_end));
            }
        }

        match bounds {
            Some((_, frame_end)) if buffer.len() >= frame_end => {
                buffer.truncate(frame_end);
                return Ok(buffer);
            }
            None if buffer.len() > limits.max_request_size => {
                return Err(ErrorKind::RequestTooLarge(limits.max_request_size));
            }
            _ => {}
        }
    }
}

/// Scans a header block for the last `Content-Length` line.
///
/// `head` is everything before the terminator. The first line is the request
/// line and is skipped, lines without a colon are ignored. Names match
/// case-insensitively, values are trimmed before the digit parse. The body
/// has not arrived yet, so the block is handled as raw bytes here and parsed
/// for real later.
fn content_length(head: &[u8]) -> Result<Option<usize>, ErrorKind> {
    let mut length = None;

    for line in head.split(|&byte| byte == b'\n').skip(1) {
        let line = trim_ascii(line);
        let Some(colon) = memchr(b':', line) else {
            continue;
        };

        if trim_ascii(&line[..colon]).eq_ignore_ascii_case(b"content-length") {
            let value = trim_ascii(&line[colon + 1..]);
            length = Some(types::slice_to_usize(value).ok_or(ErrorKind::InvalidContentLength)?);
        }
    }

    Ok(length)
}

fn trim_ascii(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !first.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }

    while let [rest @ .., last] = bytes {
        if !last.is_ascii_whitespace() {
            break;
        }
        bytes = rest;
    }

    bytes
}

#[cfg(test)]
mod frame_self {
    use super::*;

    fn limits(chunk: usize, max: usize) -> ReqLimits {
        ReqLimits {
            read_chunk_size: chunk,
            max_request_size: max,
            _priv: (),
        }
    }

    async fn frame_from(raw: &[u8], limits: &ReqLimits) -> Result<Vec<u8>, ErrorKind> {
        let mut stream = raw;
        read_frame(&mut stream, limits).await
    }

    #[tokio::test]
    async fn complete_without_body() {
        let raw = b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n";

        for chunk in [1, 3, 8, 4096] {
            let frame = frame_from(raw, &limits(chunk, 1024)).await;
            assert_eq!(frame, Ok(raw.to_vec()), "chunk size {chunk}");
        }
    }

    #[tokio::test]
    async fn complete_with_body() {
        let raw = b"POST /send HTTP/1.1\r\nContent-Length: 11\r\n\r\nname=Angela";

        for chunk in [1, 7, 4096] {
            let frame = frame_from(raw, &limits(chunk, 1024)).await;
            assert_eq!(frame, Ok(raw.to_vec()), "chunk size {chunk}");
        }
    }

    #[tokio::test]
    async fn trailing_bytes_dropped() {
        let frame = b"POST /send HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd";
        let mut raw = frame.to_vec();
        raw.extend_from_slice(b"GET /next HTTP/1.1\r\n\r\n");

        for chunk in [1, 9, 4096] {
            let got = frame_from(&raw, &limits(chunk, 1024)).await;
            assert_eq!(got, Ok(frame.to_vec()), "chunk size {chunk}");
        }
    }

    #[tokio::test]
    async fn no_length_stops_at_terminator() {
        let frame = b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n";
        let mut raw = frame.to_vec();
        raw.extend_from_slice(b"junk");

        let got = frame_from(&raw, &limits(4096, 1024)).await;
        assert_eq!(got, Ok(frame.to_vec()));
    }

    #[tokio::test]
    async fn eof_before_terminator() {
        let cases: [&[u8]; 3] = [
            b"",
            b"GET / HTTP/1.1",
            b"GET / HTTP/1.1\r\nHost: localhost\r\n",
        ];

        for raw in cases {
            let got = frame_from(raw, &limits(8, 1024)).await;
            assert_eq!(got, Err(ErrorKind::MissingHeaderTerminator));
        }
    }

    #[tokio::test]
    async fn eof_before_full_body() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";

        let got = frame_from(raw, &limits(8, 1024)).await;
        assert_eq!(
            got,
            Err(ErrorKind::IncompleteBody {
                expected: 10,
                received: 3
            })
        );
    }

    #[tokio::test]
    async fn content_length_values() {
        #[rustfmt::skip]
        let cases: [(&str, Option<ErrorKind>); 7] = [
            ("Content-Length: 4",    None),
            ("content-length: 4",    None),
            ("CONTENT-LENGTH:4",     None),
            ("Content-Length:  4  ", None),

            ("Content-Length: abc",  Some(ErrorKind::InvalidContentLength)),
            ("Content-Length: -4",   Some(ErrorKind::InvalidContentLength)),
            ("Content-Length: ",     Some(ErrorKind::InvalidContentLength)),
        ];

        for (header, expected) in cases {
            let raw = format!("POST / HTTP/1.1\r\n{header}\r\n\r\nabcd");
            let got = frame_from(raw.as_bytes(), &limits(4096, 1024)).await;

            match expected {
                None => assert_eq!(got, Ok(raw.into_bytes())),
                Some(e) => assert_eq!(got, Err(e), "case {header:?}"),
            }
        }
    }

    #[tokio::test]
    async fn last_content_length_wins() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 999\r\nContent-Length: 2\r\n\r\nok";

        let got = frame_from(raw, &limits(4096, 1024)).await;
        assert_eq!(got, Ok(raw.to_vec()));
    }

    #[tokio::test]
    async fn oversized_requests() {
        // Headers alone blow the cap.
        let raw = b"GET / HTTP/1.1\r\nX-Pad: aaaaaaaaaaaaaaaaaaaaaaaa\r\n\r\n";
        let got = frame_from(raw, &limits(8, 16)).await;
        assert_eq!(got, Err(ErrorKind::RequestTooLarge(16)));

        // A declared body that cannot fit is rejected before it arrives.
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 500\r\n\r\n";
        let got = frame_from(raw, &limits(4096, 64)).await;
        assert_eq!(got, Err(ErrorKind::RequestTooLarge(64)));
    }

    #[test]
    fn trim() {
        #[rustfmt::skip]
        let cases: [(&[u8], &[u8]); 5] = [
            (b"",        b""),
            (b"   ",     b""),
            (b"abc",     b"abc"),
            (b"  abc\r", b"abc"),
            (b"\tabc  ", b"abc"),
        ];

        for (input, expected) in cases {
            assert_eq!(trim_ascii(input), expected);
        }
    }
}

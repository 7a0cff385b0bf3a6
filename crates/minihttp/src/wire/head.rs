//! Request head encoding and response head parsing

use std::io::BufRead;

use crate::error::{HttpError, Result};
use crate::headers::HeaderMap;
use crate::request::Request;

/// Upper bound for the status line plus all response headers
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Headers whose value is always computed from the request itself
const FRAMING_HEADERS: [&str; 3] = ["Content-Length", "Transfer-Encoding", "Connection"];

/// Status line and headers of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: HeaderMap,
}

/// Serialize the request line and headers, terminated by the empty line
pub(crate) fn encode_request_head(request: &Request) -> Vec<u8> {
    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(request.method().as_str().as_bytes());
    head.push(b' ');
    head.extend_from_slice(target.as_bytes());
    head.extend_from_slice(b" HTTP/1.1\r\n");

    if !request.headers().contains("Host") {
        push_header(&mut head, "Host", &host_header(url));
    }

    for (name, value) in request.headers().iter() {
        if FRAMING_HEADERS
            .iter()
            .any(|framing| framing.eq_ignore_ascii_case(name))
        {
            tracing::warn!("Ignoring caller supplied {} header", name);
            continue;
        }
        push_header(&mut head, name, value);
    }

    match request.body() {
        Some(body) => push_header(&mut head, "Content-Length", &body.bytes.len().to_string()),
        None if request.method().expects_request_body() => {
            push_header(&mut head, "Content-Length", "0")
        }
        None => {}
    }
    push_header(&mut head, "Connection", "close");

    head.extend_from_slice(b"\r\n");
    head
}

fn push_header(head: &mut Vec<u8>, name: &str, value: &str) {
    head.extend_from_slice(name.as_bytes());
    head.extend_from_slice(b": ");
    head.extend_from_slice(value.as_bytes());
    head.extend_from_slice(b"\r\n");
}

fn host_header(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Read one response head, skipping interim `1xx` responses
pub(crate) fn read_response_head<R: BufRead>(reader: &mut R) -> Result<ResponseHead> {
    loop {
        let head = read_single_head(reader)?;
        if (100..200).contains(&head.status) && head.status != 101 {
            tracing::trace!("Skipping interim {} response", head.status);
            continue;
        }
        return Ok(head);
    }
}

fn read_single_head<R: BufRead>(reader: &mut R) -> Result<ResponseHead> {
    let mut budget = MAX_HEAD_SIZE;

    let status_line = loop {
        match read_line(reader, &mut budget)? {
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
            None => return Err(HttpError::Read("connection closed before status line".into())),
        }
    };
    let (status, reason) = parse_status_line(&status_line)?;

    let mut headers = HeaderMap::new();
    let mut last: Option<(String, String)> = None;
    loop {
        let line = read_line(reader, &mut budget)?
            .ok_or_else(|| HttpError::Read("connection closed inside headers".into()))?;
        if line.is_empty() {
            break;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // obs-fold continuation of the previous header
            let (_, value) = last
                .as_mut()
                .ok_or_else(|| HttpError::Read("header continuation without header".into()))?;
            tracing::warn!("Unfolding obsolete header line folding");
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::Read(format!("malformed header line: '{}'", line)))?;
        let name = name.trim_end();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(HttpError::Read(format!("malformed header name: '{}'", name)));
        }

        if let Some((name, value)) = last.take() {
            headers.add(name, value);
        }
        last = Some((name.to_string(), value.trim().to_string()));
    }
    if let Some((name, value)) = last {
        headers.add(name, value);
    }

    Ok(ResponseHead {
        status,
        reason,
        headers,
    })
}

fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let malformed = || HttpError::Read(format!("malformed status line: '{}'", line));

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(malformed)?;
    if !matches!(version, "HTTP/1.1" | "HTTP/1.0") {
        return Err(malformed());
    }

    let code = parts.next().ok_or_else(malformed)?;
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    let status = code.parse::<u16>().map_err(|_| malformed())?;
    if !(100..600).contains(&status) {
        return Err(malformed());
    }

    let reason = parts.next().unwrap_or_default().trim().to_string();
    Ok((status, reason))
}

/// Read a CRLF (or bare LF) terminated line without the terminator
///
/// Returns `None` on EOF before any byte was read.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, budget: &mut usize) -> Result<Option<String>> {
    let mut line = Vec::new();
    loop {
        let available = reader.fill_buf().map_err(HttpError::from_read_io)?;
        if available.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            return Err(HttpError::Read("connection closed mid-line".into()));
        }

        let (consumed, done) = match available.iter().position(|&b| b == b'\n') {
            Some(index) => (index + 1, true),
            None => (available.len(), false),
        };
        if consumed > *budget {
            return Err(HttpError::Read("response head too large".into()));
        }
        *budget -= consumed;
        line.extend_from_slice(&available[..consumed]);
        reader.consume(consumed);

        if done {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(Some(decode_line(line)));
        }
    }
}

/// UTF-8 when it decodes, otherwise obs-text read as ISO-8859-1
fn decode_line(line: Vec<u8>) -> String {
    match String::from_utf8(line) {
        Ok(text) => text,
        Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use url::Url;

    use super::*;
    use crate::content_type::ContentType;
    use crate::method::Method;
    use crate::request::{Body, RequestOptions};

    fn request(method: Method, url: &str, body: Option<&[u8]>) -> Request {
        let mut headers = HeaderMap::new();
        headers.add("Accept", "*/*");
        headers.add("content-length", "999");
        Request {
            method,
            url: Url::parse(url).expect("valid url"),
            headers,
            body: body.map(|bytes| Body {
                content_type: ContentType::new(ContentType::OCTET_STREAM),
                bytes: bytes.to_vec(),
            }),
            options: RequestOptions::default(),
        }
    }

    #[test]
    fn test_encode_request_head_computes_length() {
        let head = encode_request_head(&request(
            Method::Post,
            "http://example.com:8080/a%20b?x=1&y=2",
            Some(b"hello"),
        ));
        let head = String::from_utf8(head).expect("ascii head");

        assert_eq!(
            head,
            "POST /a%20b?x=1&y=2 HTTP/1.1\r\n\
             Host: example.com:8080\r\n\
             Accept: */*\r\n\
             Content-Length: 5\r\n\
             Connection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_encode_request_head_default_port_and_empty_post() {
        let head = encode_request_head(&request(Method::Post, "http://example.com/", None));
        let head = String::from_utf8(head).expect("ascii head");
        assert!(head.starts_with("POST / HTTP/1.1\r\nHost: example.com\r\n"));
        assert!(head.contains("Content-Length: 0\r\n"));

        let head = encode_request_head(&request(Method::Get, "http://example.com/", None));
        let head = String::from_utf8(head).expect("ascii head");
        assert!(!head.contains("Content-Length"));
    }

    #[test]
    fn test_read_response_head() {
        let mut reader = Cursor::new(
            b"HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nX-Multi: a\r\nx-multi: b\r\n\r\nbody"
                .to_vec(),
        );
        let head = read_response_head(&mut reader).expect("valid head");

        assert_eq!(head.status, 404);
        assert_eq!(head.reason, "Not Found");
        assert_eq!(head.headers.get("content-type"), Some("text/plain"));
        assert_eq!(head.headers.get_all("X-MULTI").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(head.headers.iter().next(), Some(("Content-Type", "text/plain")));
    }

    #[test]
    fn test_interim_responses_are_skipped() {
        let mut reader = Cursor::new(
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec(),
        );
        let head = read_response_head(&mut reader).expect("valid head");
        assert_eq!(head.status, 200);
    }

    #[test]
    fn test_folded_header_is_unfolded() {
        let mut reader =
            Cursor::new(b"HTTP/1.0 200 OK\nX-Long: first\n  second\n\n".to_vec());
        let head = read_response_head(&mut reader).expect("valid head");
        assert_eq!(head.headers.get("x-long"), Some("first second"));
    }

    #[test]
    fn test_malformed_status_lines() {
        let cases: [&[u8]; 4] = [
            b"ICY 200 OK\r\n\r\n",
            b"HTTP/1.1 2000 OK\r\n\r\n",
            b"HTTP/1.1 abc OK\r\n\r\n",
            b"HTTP/1.1\r\n\r\n",
        ];
        for raw in cases {
            let result = read_response_head(&mut Cursor::new(raw.to_vec()));
            assert!(matches!(result, Err(HttpError::Read(_))), "{:?}", raw);
        }
    }

    #[test]
    fn test_obs_text_header_value_is_kept() {
        let mut reader = Cursor::new(
            b"HTTP/1.1 200 D\xe9j\xe0 vu\r\nContent-Disposition: attachment; filename=\"caf\xe9.txt\"\r\n\r\n"
                .to_vec(),
        );
        let head = read_response_head(&mut reader).expect("obs-text is allowed");
        assert_eq!(head.reason, "D\u{e9}j\u{e0} vu");
        assert_eq!(
            head.headers.get("content-disposition"),
            Some("attachment; filename=\"caf\u{e9}.txt\"")
        );

        let mut reader = Cursor::new("HTTP/1.1 200 OK\r\nX-Name: caf\u{e9}\r\n\r\n".as_bytes().to_vec());
        let head = read_response_head(&mut reader).expect("utf-8 head");
        assert_eq!(head.headers.get("x-name"), Some("caf\u{e9}"));
    }

    #[test]
    fn test_truncated_head() {
        let result = read_response_head(&mut Cursor::new(b"HTTP/1.1 200 OK\r\nServer: x".to_vec()));
        assert!(matches!(result, Err(HttpError::Read(_))));

        let result = read_response_head(&mut Cursor::new(Vec::new()));
        assert!(matches!(result, Err(HttpError::Read(_))));
    }
}

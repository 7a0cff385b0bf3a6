//! Response body framing

use std::io::{self, BufRead, Read};

use crate::error::{HttpError, Result};
use crate::headers::HeaderMap;
use crate::method::Method;

use super::head::read_line;

/// Limit for one chunk-size or trailer line
const MAX_CHUNK_LINE: usize = 8 * 1024;

/// How the end of a response body is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// No body at all (HEAD, 1xx, 204, 304)
    Empty,
    /// Exactly this many bytes
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// Everything until the server closes the connection
    CloseDelimited,
}

impl Framing {
    /// Pick the framing for a response to `method`
    pub(crate) fn for_response(method: Method, status: u16, headers: &HeaderMap) -> Result<Self> {
        if !method.allows_response_body()
            || (100..200).contains(&status)
            || status == 204
            || status == 304
        {
            return Ok(Framing::Empty);
        }

        let mut transfer_codings = headers
            .get_all("Transfer-Encoding")
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|coding| !coding.is_empty())
            .peekable();
        if transfer_codings.peek().is_some() {
            return match transfer_codings.last() {
                Some(coding) if coding.eq_ignore_ascii_case("chunked") => Ok(Framing::Chunked),
                _ => Ok(Framing::CloseDelimited),
            };
        }

        let mut declared: Option<u64> = None;
        for value in headers
            .get_all("Content-Length")
            .flat_map(|value| value.split(','))
        {
            let length = value
                .trim()
                .parse::<u64>()
                .map_err(|_| HttpError::Read(format!("invalid Content-Length: '{}'", value)))?;
            match declared {
                Some(previous) if previous != length => {
                    return Err(HttpError::Read("conflicting Content-Length headers".into()))
                }
                _ => declared = Some(length),
            }
        }

        Ok(match declared {
            Some(length) => Framing::Length(length),
            None => Framing::CloseDelimited,
        })
    }
}

#[derive(Debug)]
enum State {
    Length { remaining: u64 },
    Chunked { remaining: u64 },
    CloseDelimited,
    Done,
}

/// Reader yielding exactly the body bytes of one response
///
/// Errors carry an [`io::ErrorKind`] that [`HttpError::from_read_io`] maps
/// back: `UnexpectedEof` for truncation, `InvalidData` for bad chunk framing,
/// `TimedOut` for an expired read deadline.
#[derive(Debug)]
pub(crate) struct BodyReader<R> {
    inner: R,
    state: State,
}

impl<R: BufRead> BodyReader<R> {
    pub(crate) fn new(inner: R, framing: Framing) -> Self {
        let state = match framing {
            Framing::Empty | Framing::Length(0) => State::Done,
            Framing::Length(remaining) => State::Length { remaining },
            Framing::Chunked => State::Chunked { remaining: 0 },
            Framing::CloseDelimited => State::CloseDelimited,
        };
        Self { inner, state }
    }

    /// Whether the end of the body was reached
    pub(crate) fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Read the rest of the body, failing once `limit` bytes are exceeded
    pub(crate) fn read_all(&mut self, limit: Option<usize>) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut chunk = [0u8; 8 * 1024];
        loop {
            let read = self.read(&mut chunk).map_err(HttpError::from_read_io)?;
            if read == 0 {
                return Ok(body);
            }
            if let Some(limit) = limit {
                if body.len() + read > limit {
                    return Err(HttpError::Read(format!(
                        "response body exceeds limit of {} bytes",
                        limit
                    )));
                }
            }
            body.extend_from_slice(&chunk[..read]);
        }
    }

    fn next_chunk_size(&mut self) -> io::Result<u64> {
        let line = self.chunk_line()?;
        let size = line.split(';').next().unwrap_or_default().trim();
        if size.is_empty() || size.len() > 16 {
            return Err(invalid_data(format!("invalid chunk size line: '{}'", line)));
        }
        u64::from_str_radix(size, 16)
            .map_err(|_| invalid_data(format!("invalid chunk size line: '{}'", line)))
    }

    fn chunk_line(&mut self) -> io::Result<String> {
        let mut budget = MAX_CHUNK_LINE;
        match read_line(&mut self.inner, &mut budget) {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside chunked body",
            )),
            Err(HttpError::Timeout(_)) => Err(io::Error::from(io::ErrorKind::TimedOut)),
            Err(err) => Err(invalid_data(err.to_string())),
        }
    }

    /// Chunk data is terminated by exactly CRLF
    fn expect_crlf(&mut self) -> io::Result<()> {
        let mut terminator = [0u8; 2];
        self.inner.read_exact(&mut terminator)?;
        if terminator != *b"\r\n" {
            return Err(invalid_data("missing CRLF after chunk data".into()));
        }
        Ok(())
    }

    fn skip_trailers(&mut self) -> io::Result<()> {
        loop {
            if self.chunk_line()?.is_empty() {
                return Ok(());
            }
        }
    }

    fn read_limited(&mut self, buf: &mut [u8], remaining: u64) -> io::Result<usize> {
        let max = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let read = self.inner.read(&mut buf[..max])?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended {} bytes early", remaining),
            ));
        }
        Ok(read)
    }
}

impl<R: BufRead> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            match self.state {
                State::Done => return Ok(0),
                State::CloseDelimited => {
                    let read = self.inner.read(buf)?;
                    if read == 0 {
                        self.state = State::Done;
                    }
                    return Ok(read);
                }
                State::Length { remaining } => {
                    let read = self.read_limited(buf, remaining)?;
                    let remaining = remaining - read as u64;
                    self.state = if remaining == 0 {
                        State::Done
                    } else {
                        State::Length { remaining }
                    };
                    return Ok(read);
                }
                State::Chunked { remaining: 0 } => {
                    let size = self.next_chunk_size()?;
                    if size == 0 {
                        self.skip_trailers()?;
                        self.state = State::Done;
                    } else {
                        self.state = State::Chunked { remaining: size };
                    }
                }
                State::Chunked { remaining } => {
                    let read = self.read_limited(buf, remaining)?;
                    let remaining = remaining - read as u64;
                    if remaining == 0 {
                        self.expect_crlf()?;
                    }
                    self.state = State::Chunked { remaining };
                    return Ok(read);
                }
            }
        }
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

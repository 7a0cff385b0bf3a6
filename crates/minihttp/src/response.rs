//! HTTP response types

use std::io::{self, Read};

#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use url::Url;

use crate::codec::{BodyCodec, TextCodec};
use crate::content_type::ContentType;
use crate::error::{HttpError, Result};
use crate::headers::HeaderMap;
use crate::wire::{BodyReader, ConnectionReader, ResponseHead};

/// Status metadata shared by buffered and streaming responses
macro_rules! status_accessors {
    () => {
        /// Get the HTTP status code
        pub fn status(&self) -> u16 {
            self.status
        }

        /// Reason phrase of the status line
        pub fn reason(&self) -> &str {
            &self.reason
        }

        /// First value of a header, looked up case-insensitively
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers.get(name)
        }

        /// All headers as received
        pub fn headers(&self) -> &HeaderMap {
            &self.headers
        }

        /// URL of the final hop, after redirects
        pub fn url(&self) -> &Url {
            &self.url
        }

        /// Declared `Content-Type`
        pub fn content_type(&self) -> Option<ContentType> {
            self.headers.get("Content-Type").map(ContentType::new)
        }

        /// Declared `Content-Length`
        ///
        /// This is the header value, which may differ from the bytes read for
        /// chunked or HEAD responses.
        pub fn content_length(&self) -> Option<u64> {
            self.headers
                .get("Content-Length")
                .and_then(|value| value.trim().parse().ok())
        }

        /// Check if the response status is a success (2xx)
        pub fn is_success(&self) -> bool {
            (200..300).contains(&self.status)
        }

        /// Check if the response status is a redirect (3xx)
        pub fn is_redirect(&self) -> bool {
            (300..400).contains(&self.status)
        }

        /// Check if the response status is a client error (4xx)
        pub fn is_client_error(&self) -> bool {
            (400..500).contains(&self.status)
        }

        /// Check if the response status is a server error (5xx)
        pub fn is_server_error(&self) -> bool {
            (500..600).contains(&self.status)
        }
    };
}

/// Fully buffered HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    reason: String,
    headers: HeaderMap,
    url: Url,
    body: Vec<u8>,
}

impl Response {
    pub(crate) fn new(head: ResponseHead, url: Url, body: Vec<u8>) -> Self {
        Self {
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            url,
            body,
        }
    }

    status_accessors!();

    /// Raw body bytes
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Take the body bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }

    /// Body decoded as UTF-8 text
    pub fn text(&self) -> Result<String> {
        self.body_as(&TextCodec)
    }

    /// Decode the body with `codec`
    pub fn body_as<T, C>(&self, codec: &C) -> Result<T>
    where
        C: BodyCodec<T> + ?Sized,
    {
        codec.decode(self.content_type().as_ref(), &self.body)
    }

    /// Body decoded as JSON
    #[cfg(feature = "json")]
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        crate::codec::decode_json(self.content_type().as_ref(), &self.body)
    }

    /// Turn a non-2xx response into [`HttpError::Status`]
    ///
    /// The error message is the body text, or the reason phrase when the
    /// body is empty.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }

        let message = if self.body.is_empty() {
            self.reason
        } else {
            String::from_utf8_lossy(&self.body).into_owned()
        };
        Err(HttpError::Status {
            status: self.status,
            message,
        })
    }
}

/// Single-use body reader owning the connection
///
/// The connection is released at end of body, on the first error, or when
/// the reader is dropped.
#[derive(Debug)]
pub struct BodyStream {
    reader: Option<BodyReader<ConnectionReader>>,
}

impl BodyStream {
    pub(crate) fn new(reader: BodyReader<ConnectionReader>) -> Self {
        let mut stream = Self {
            reader: Some(reader),
        };
        stream.release_if_done();
        stream
    }

    /// Whether the underlying connection was already released
    pub fn is_released(&self) -> bool {
        self.reader.is_none()
    }

    fn release_if_done(&mut self) {
        if self.reader.as_ref().is_some_and(BodyReader::is_done) {
            self.release();
        }
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            tracing::trace!("Released response connection");
        }
    }

    fn read_to_limit(&mut self, limit: Option<usize>) -> Result<Vec<u8>> {
        let result = match self.reader.as_mut() {
            Some(reader) => reader.read_all(limit),
            None => Ok(Vec::new()),
        };
        self.release();
        result
    }
}

impl Read for BodyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };

        match reader.read(buf) {
            Ok(read) => {
                if read == 0 || reader.is_done() {
                    self.release();
                }
                Ok(read)
            }
            Err(err) => {
                self.release();
                Err(err)
            }
        }
    }
}

/// Response whose body is read lazily from the open connection
#[derive(Debug)]
pub struct StreamingResponse {
    status: u16,
    reason: String,
    headers: HeaderMap,
    url: Url,
    max_body_size: Option<usize>,
    body: BodyStream,
}

impl StreamingResponse {
    pub(crate) fn new(
        head: ResponseHead,
        url: Url,
        body: BodyReader<ConnectionReader>,
        max_body_size: Option<usize>,
    ) -> Self {
        Self {
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            url,
            max_body_size,
            body: BodyStream::new(body),
        }
    }

    status_accessors!();

    /// The body reader
    pub fn body(&mut self) -> &mut BodyStream {
        &mut self.body
    }

    /// Read the rest of the body into a [`Response`]
    ///
    /// The configured maximum body size applies.
    pub fn into_buffered(mut self) -> Result<Response> {
        let body = self.body.read_to_limit(self.max_body_size)?;
        Ok(Response {
            status: self.status,
            reason: self.reason,
            headers: self.headers,
            url: self.url,
            body,
        })
    }

    /// Release the connection without reading the rest of the body
    pub fn close(mut self) {
        self.body.release();
    }
}

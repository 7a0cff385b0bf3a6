//! Request execution over a [`Transport`]

use std::io::{BufReader, Write};
use std::sync::Arc;

use tracing::instrument;
use url::Url;

use crate::error::{HttpError, Result};
use crate::request::Request;
use crate::response::{Response, StreamingResponse};
use crate::transport::{Target, Transport};
use crate::wire::{
    encode_request_head, read_response_head, BodyReader, ConnectionReader, DeadlineReader,
    Framing, ResponseHead,
};

/// Status codes that carry a `Location` to follow
const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Response head plus the unread body of one hop
struct Exchange {
    head: ResponseHead,
    body: BodyReader<ConnectionReader>,
}

/// Performs the network exchange for a [`Request`]
///
/// Every hop opens its own connection, which is closed once the response was
/// read or the exchange failed.
#[derive(Debug, Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
}

impl Executor {
    /// Create an executor over `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Execute `request`, following redirects, and buffer the final body
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    pub fn execute(&self, request: Request) -> Result<Response> {
        let max_body_size = request.options().max_body_size;
        let (url, mut exchange) = self.dispatch(request)?;
        let body = exchange.body.read_all(max_body_size)?;

        tracing::debug!(
            "Received {} with {} body bytes",
            exchange.head.status,
            body.len()
        );
        Ok(Response::new(exchange.head, url, body))
    }

    /// Execute `request`, following redirects, and return before reading the body
    #[instrument(skip_all, fields(method = %request.method(), url = %request.url()))]
    pub fn execute_streaming(&self, request: Request) -> Result<StreamingResponse> {
        let max_body_size = request.options().max_body_size;
        let (url, exchange) = self.dispatch(request)?;

        tracing::debug!("Streaming {} response", exchange.head.status);
        Ok(StreamingResponse::new(
            exchange.head,
            url,
            exchange.body,
            max_body_size,
        ))
    }

    fn dispatch(&self, mut request: Request) -> Result<(Url, Exchange)> {
        let policy = request.options().redirect;
        let mut remaining = policy.max_redirects;

        loop {
            let exchange = self.send(&request)?;
            let status = exchange.head.status;

            let location = exchange.head.headers.get("Location").map(str::to_string);
            let location = match location {
                Some(location) if policy.follow && REDIRECT_STATUSES.contains(&status) => location,
                _ => return Ok((request.url, exchange)),
            };
            // The next hop gets a fresh connection
            drop(exchange);

            if remaining == 0 {
                tracing::debug!("Redirect limit of {} reached", policy.max_redirects);
                return Err(HttpError::RedirectLoop {
                    max: policy.max_redirects,
                });
            }
            remaining -= 1;

            let next = request.url().join(&location).map_err(|e| {
                HttpError::Read(format!("invalid Location header '{}': {}", location, e))
            })?;
            tracing::debug!("Following {} redirect to {}", status, next);
            request = request.redirected(status, next);
        }
    }

    fn send(&self, request: &Request) -> Result<Exchange> {
        let target = Target::from_url(request.url())?;
        tracing::debug!(
            "{} {} via {}:{}",
            request.method(),
            request.url(),
            target.host,
            target.port
        );

        let mut connection = self
            .transport
            .connect(&target, request.options().connect_timeout)?;

        let head = encode_request_head(request);
        tracing::trace!("Writing {} byte request head", head.len());
        connection.write_all(&head).map_err(write_error)?;
        if let Some(body) = request.body() {
            tracing::trace!("Writing {} byte request body", body.bytes.len());
            connection.write_all(&body.bytes).map_err(write_error)?;
        }
        connection.flush().map_err(write_error)?;

        let mut reader = BufReader::new(DeadlineReader::new(
            connection,
            request.options().read_timeout,
        ));
        let head = read_response_head(&mut reader)?;
        let framing = Framing::for_response(request.method(), head.status, &head.headers)?;

        Ok(Exchange {
            head,
            body: BodyReader::new(reader, framing),
        })
    }
}

fn write_error(err: std::io::Error) -> HttpError {
    HttpError::Write(err.to_string())
}

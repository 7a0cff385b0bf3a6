//! HTTP/1.1 framing

use std::io::{self, BufReader, Read};
use std::time::{Duration, Instant};

use crate::transport::Connection;

pub(crate) mod body;
pub(crate) mod head;

pub(crate) use body::{BodyReader, Framing};
pub(crate) use head::{encode_request_head, read_response_head, ResponseHead};

/// Buffered reader over a connection, bounded by one read deadline
pub(crate) type ConnectionReader = BufReader<DeadlineReader>;

/// Connection reader enforcing a single deadline across all reads
///
/// Each read is bounded by what is left of the budget, so a server trickling
/// bytes cannot stretch the read phase past the configured timeout.
#[derive(Debug)]
pub(crate) struct DeadlineReader {
    connection: Box<dyn Connection>,
    deadline: Option<Instant>,
}

impl DeadlineReader {
    pub(crate) fn new(connection: Box<dyn Connection>, timeout: Option<Duration>) -> Self {
        Self {
            connection,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
        }
    }
}

impl Read for DeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            self.connection.set_read_timeout(Some(remaining))?;
        }

        match self.connection.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                Err(io::Error::from(io::ErrorKind::TimedOut))
            }
            other => other,
        }
    }
}

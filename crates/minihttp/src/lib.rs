//! Small blocking HTTP/1.1 client
//!
//! A [`Client`] holds shared defaults (base URL, headers, timeouts, redirect
//! policy) and hands out [`RequestBuilder`]s. A built [`Request`] is executed
//! over its own connection and yields a buffered [`Response`] or a
//! [`StreamingResponse`] that reads the body lazily.
//!
//! Bodies are encoded and decoded by explicit [`BodyCodec`] values. JSON
//! support sits behind the `json` feature and TLS behind the `tls` feature.
//!
//! # Example
//!
//! ```no_run
//! use minihttp::{Client, FormCodec, HttpError};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Login {
//!     user: String,
//! }
//!
//! fn example() -> Result<(), HttpError> {
//!     let client = Client::new("http://api.example.com/v1")?;
//!
//!     let response = client
//!         .post_with("login", &Login { user: "jane".into() }, &FormCodec)?
//!         .error_for_status()?;
//!     println!("{}", response.text()?);
//!
//!     let raw = client.get("items").query("page", "2").execute()?;
//!     assert!(raw.is_success());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod client;
pub mod codec;
mod content_type;
mod error;
pub mod executor;
mod headers;
mod method;
pub mod request;
pub mod response;
pub mod transport;
mod wire;

pub use builder::RequestBuilder;
pub use client::{Client, ClientBuilder, ClientConfig};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use codec::{BodyCodec, FormCodec, RawCodec, TextCodec};
pub use content_type::ContentType;
pub use error::{HttpError, Result, TimeoutPhase};
pub use executor::Executor;
pub use headers::{GetAll, HeaderMap};
pub use method::Method;
pub use request::{Body, RedirectPolicy, Request, RequestOptions};
pub use response::{BodyStream, Response, StreamingResponse};
pub use transport::{Connection, Scheme, Target, TcpTransport, Transport};

//! Fluent request builder

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose;
use base64::Engine as _;
#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::client::Client;
use crate::codec::{BodyCodec, RawCodec};
use crate::content_type::ContentType;
use crate::error::{HttpError, Result};
use crate::headers::{is_valid_name, is_valid_value, HeaderMap};
use crate::method::Method;
use crate::request::{Body, RedirectPolicy, Request, RequestOptions};
use crate::response::{Response, StreamingResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodySource {
    Encoded,
    Raw,
}

#[derive(Debug, Clone)]
struct PendingBody {
    source: BodySource,
    body: Result<Body>,
}

/// Builder for one request, seeded with the defaults of a [`Client`]
///
/// Every setter consumes and returns the builder. Problems found while
/// accumulating (an encoding failure, an invalid path segment) are kept and
/// reported by [`RequestBuilder::build`], before any I/O happens.
pub struct RequestBuilder<C = RawCodec> {
    client: Client<C>,
    method: Option<Method>,
    absolute: Option<Url>,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    /// `Content-Type` was set on this builder rather than inherited
    content_type_set: bool,
    body: Option<PendingBody>,
    conflicting_body: bool,
    error: Option<HttpError>,
    options: RequestOptions,
}

impl<C> fmt::Debug for RequestBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("absolute", &self.absolute)
            .field("segments", &self.segments)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<C> RequestBuilder<C> {
    pub(crate) fn new(client: Client<C>) -> Self {
        let headers = client.default_headers().clone();
        let options = client.default_options();
        Self {
            client,
            method: None,
            absolute: None,
            segments: Vec::new(),
            query: Vec::new(),
            headers,
            content_type_set: false,
            body: None,
            conflicting_body: false,
            error: None,
            options,
        }
    }

    /// Set the request method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Append the `/` separated segments of `path` to the base URL
    ///
    /// Empty segments are skipped. Each segment is percent-encoded.
    pub fn path(mut self, path: &str) -> Self {
        if path.contains("://") || path.starts_with("//") {
            self.record_error(HttpError::Build(format!(
                "path '{}' is an absolute URL, use url() to target it",
                path
            )));
            return self;
        }

        for segment in path.split('/').filter(|segment| !segment.is_empty()) {
            self.push_segment(segment);
        }
        self
    }

    /// Append one literal path segment; a `/` inside it is encoded
    pub fn segment(mut self, segment: &str) -> Self {
        self.push_segment(segment);
        self
    }

    /// Target an absolute URL, bypassing the base URL
    ///
    /// Combining it with [`RequestBuilder::path`] or
    /// [`RequestBuilder::segment`] is a build error.
    pub fn url(mut self, url: Url) -> Self {
        self.absolute = Some(url);
        self
    }

    /// Append a query parameter; repeated names are kept
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a header, replacing defaults and earlier values of the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.note_content_type(&name);
        self.headers.set(name, value);
        self
    }

    /// Append a header value, keeping defaults and earlier values
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.note_content_type(&name);
        self.headers.add(name, value);
        self
    }

    /// Encode `payload` with `codec` as the request body
    ///
    /// Encoding happens now; a failure is returned by [`RequestBuilder::build`].
    pub fn body<T, B>(self, payload: &T, codec: &B) -> Self
    where
        B: BodyCodec<T> + ?Sized,
    {
        let body = codec.encode(payload).map(|bytes| Body {
            content_type: codec.content_type(),
            bytes,
        });
        self.set_body(BodySource::Encoded, body)
    }

    /// Encode `payload` with the client's default codec
    pub fn payload<T>(self, payload: &T) -> Self
    where
        C: BodyCodec<T>,
    {
        let codec = self.client.codec();
        let body = codec.encode(payload).map(|bytes| Body {
            content_type: codec.content_type(),
            bytes,
        });
        self.set_body(BodySource::Encoded, body)
    }

    /// Set the request body as form data
    pub fn form<T: Serialize + ?Sized>(self, payload: &T) -> Self {
        let body = serde_urlencoded::to_string(payload)
            .map(|form| Body {
                content_type: ContentType::new(ContentType::FORM),
                bytes: form.into_bytes(),
            })
            .map_err(HttpError::from);
        self.set_body(BodySource::Encoded, body)
    }

    /// Set the request body as JSON
    #[cfg(feature = "json")]
    pub fn json<T: Serialize + ?Sized>(self, payload: &T) -> Self {
        let body = serde_json::to_vec(payload)
            .map(|bytes| Body {
                content_type: ContentType::new(ContentType::JSON),
                bytes,
            })
            .map_err(|e| HttpError::Encode(e.to_string()));
        self.set_body(BodySource::Encoded, body)
    }

    /// Use `bytes` as the request body
    pub fn body_bytes(
        self,
        bytes: impl Into<Vec<u8>>,
        content_type: impl Into<ContentType>,
    ) -> Self {
        let body = Body {
            content_type: content_type.into(),
            bytes: bytes.into(),
        };
        self.set_body(BodySource::Raw, Ok(body))
    }

    /// Override the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Override the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = Some(timeout);
        self
    }

    /// Override both the connect and the read timeout
    pub fn timeout(self, timeout: Duration) -> Self {
        self.connect_timeout(timeout).read_timeout(timeout)
    }

    /// Enable or disable following redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.options.redirect.follow = follow;
        self
    }

    /// Override the maximum number of redirect hops
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.options.redirect.max_redirects = max_redirects;
        self
    }

    /// Replace the redirect policy
    pub fn redirect_policy(mut self, policy: RedirectPolicy) -> Self {
        self.options.redirect = policy;
        self
    }

    /// Bound the size of a buffered response body
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.options.max_body_size = Some(limit);
        self
    }

    /// Send `Authorization: Bearer <token>`
    pub fn bearer_auth(self, token: impl fmt::Display) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// Send HTTP basic credentials
    pub fn basic_auth(self, username: impl fmt::Display, password: Option<&str>) -> Self {
        let credentials = match password {
            Some(password) => format!("{}:{}", username, password),
            None => format!("{}:", username),
        };
        let encoded = general_purpose::STANDARD.encode(credentials);
        self.header("Authorization", format!("Basic {}", encoded))
    }

    /// Snapshot the accumulated state into a [`Request`]
    ///
    /// The builder is left untouched, so building twice gives two equal
    /// requests.
    pub fn build(&self) -> Result<Request> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let method = self
            .method
            .ok_or_else(|| HttpError::Build("request method is not set".to_string()))?;
        if self.conflicting_body {
            return Err(HttpError::Build(
                "both an encoded payload and raw body bytes were set".to_string(),
            ));
        }

        let url = self.resolve_url()?;

        for (name, value) in self.headers.iter() {
            if !is_valid_name(name) {
                return Err(HttpError::Build(format!("invalid header name: '{}'", name)));
            }
            if !is_valid_value(value) {
                return Err(HttpError::Build(format!(
                    "invalid value for header {}",
                    name
                )));
            }
        }

        let body = match &self.body {
            Some(pending) => Some(pending.body.clone()?),
            None => None,
        };
        let mut headers = self.headers.clone();
        if let Some(body) = &body {
            if !self.content_type_set {
                headers.set("Content-Type", body.content_type.as_str());
            }
        }

        Ok(Request {
            method,
            url,
            headers,
            body,
            options: self.options,
        })
    }

    /// Build and execute, buffering the response body
    pub fn execute(self) -> Result<Response> {
        let request = self.build()?;
        self.client.executor().execute(request)
    }

    /// Build and execute, returning before the body is read
    pub fn execute_streaming(self) -> Result<StreamingResponse> {
        let request = self.build()?;
        self.client.executor().execute_streaming(request)
    }

    /// Build, execute and decode a 2xx JSON response
    #[cfg(feature = "json")]
    pub fn execute_json<R: DeserializeOwned>(self) -> Result<R> {
        self.execute()?.error_for_status()?.json()
    }

    fn resolve_url(&self) -> Result<Url> {
        let mut url = match (&self.absolute, self.client.base_url()) {
            (Some(_), _) if !self.segments.is_empty() => {
                return Err(HttpError::Build(
                    "path segments cannot be combined with an absolute URL".to_string(),
                ))
            }
            (Some(absolute), _) => absolute.clone(),
            (None, Some(base)) => base.clone(),
            (None, None) => {
                return Err(HttpError::Build(
                    "no base URL configured and no absolute URL given".to_string(),
                ))
            }
        };

        if !matches!(url.scheme(), "http" | "https") {
            return Err(HttpError::Build(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        if !self.segments.is_empty() {
            if url.cannot_be_a_base() {
                return Err(HttpError::Build(format!("URL cannot carry a path: {}", url)));
            }
            if let Ok(mut path) = url.path_segments_mut() {
                path.pop_if_empty().extend(&self.segments);
            }
        }
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }

    fn push_segment(&mut self, segment: &str) {
        if segment == "." || segment == ".." {
            self.record_error(HttpError::Build(format!(
                "path segment '{}' would leave the base URL",
                segment
            )));
            return;
        }
        self.segments.push(segment.to_string());
    }

    fn set_body(mut self, source: BodySource, body: Result<Body>) -> Self {
        if self
            .body
            .as_ref()
            .is_some_and(|existing| existing.source != source)
        {
            self.conflicting_body = true;
        }
        self.body = Some(PendingBody { source, body });
        self
    }

    fn note_content_type(&mut self, name: &str) {
        if name.eq_ignore_ascii_case("Content-Type") {
            self.content_type_set = true;
        }
    }

    fn record_error(&mut self, err: HttpError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

//! HTTP client and its configuration

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "json")]
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::builder::RequestBuilder;
use crate::codec::{BodyCodec, RawCodec};
use crate::error::{HttpError, Result};
use crate::executor::Executor;
use crate::headers::HeaderMap;
use crate::method::Method;
use crate::request::{RedirectPolicy, RequestOptions, DEFAULT_MAX_REDIRECTS};
use crate::response::Response;
use crate::transport::{TcpTransport, Transport};

/// `User-Agent` sent unless configured otherwise
pub const DEFAULT_USER_AGENT: &str = concat!("minihttp/", env!("CARGO_PKG_VERSION"));

/// Default budget for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default budget for reading a response
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60 * 60);

type Decorator<C> = Arc<dyn Fn(RequestBuilder<C>) -> RequestBuilder<C> + Send + Sync>;

struct ClientInner<C> {
    base_url: Option<Url>,
    headers: HeaderMap,
    options: RequestOptions,
    codec: C,
    decorators: Vec<Decorator<C>>,
    executor: Executor,
}

/// Blocking HTTP client holding shared request defaults
///
/// Cloning is cheap and clones share the same defaults. The defaults never
/// change after [`ClientBuilder::build`]; every request works on its own
/// copy, so one client can serve many threads.
pub struct Client<C = RawCodec> {
    inner: Arc<ClientInner<C>>,
}

impl<C> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url.as_ref().map(Url::as_str))
            .field("headers", &self.inner.headers)
            .field("options", &self.inner.options)
            .field("decorators", &self.inner.decorators.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client builder
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client with default settings for `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }
}

impl<C> Client<C> {
    /// Base URL that relative paths are resolved against
    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    /// Headers added to every request
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Codec used by [`RequestBuilder::payload`]
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    /// Executor performing the network exchange
    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub(crate) fn default_options(&self) -> RequestOptions {
        self.inner.options
    }

    /// Builder for `path` below the base URL, with no method set yet
    pub fn at(&self, path: &str) -> RequestBuilder<C> {
        let builder = self
            .inner
            .decorators
            .iter()
            .fold(RequestBuilder::new(self.clone()), |builder, decorate| {
                decorate(builder)
            });
        builder.path(path)
    }

    /// Builder for `method` on `path` below the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder<C> {
        self.at(path).method(method)
    }

    /// Builder for `method` on an absolute URL
    pub fn request_url(&self, method: Method, url: Url) -> RequestBuilder<C> {
        self.at("").method(method).url(url)
    }

    /// GET `path`
    pub fn get(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Get, path)
    }

    /// POST `path`
    pub fn post(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Post, path)
    }

    /// PUT `path`
    pub fn put(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Put, path)
    }

    /// PATCH `path`
    pub fn patch(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Patch, path)
    }

    /// DELETE `path`
    pub fn delete(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Delete, path)
    }

    /// HEAD `path`
    pub fn head(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Head, path)
    }

    /// OPTIONS `path`
    pub fn options(&self, path: &str) -> RequestBuilder<C> {
        self.request(Method::Options, path)
    }

    // === Simple convenience methods ===

    /// GET request, returns the body of a 2xx response
    pub fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.get(path).execute()?.error_for_status()?.into_bytes())
    }

    /// POST `payload` encoded with `codec`
    pub fn post_with<T, B>(&self, path: &str, payload: &T, codec: &B) -> Result<Response>
    where
        B: BodyCodec<T> + ?Sized,
    {
        self.post(path).body(payload, codec).execute()
    }

    /// GET request, returns JSON deserialized to R
    #[cfg(feature = "json")]
    pub fn fetch_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.get(path).execute_json()
    }
}

/// Serializable client settings
///
/// Timeouts are given in milliseconds. Missing fields take the same defaults
/// as [`ClientBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL for relative paths
    pub base_url: Option<Url>,
    /// Headers added to every request
    pub headers: BTreeMap<String, String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Read timeout in milliseconds
    pub read_timeout_ms: Option<u64>,
    /// Follow redirects
    pub follow_redirects: bool,
    /// Maximum number of redirect hops
    pub max_redirects: u32,
    /// Rewrite POST to GET on 301/302/303
    pub downgrade_post: bool,
    /// `User-Agent` header value
    pub user_agent: Option<String>,
    /// Upper bound for buffered response bodies, in bytes
    pub max_body_size: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: BTreeMap::new(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            downgrade_post: true,
            user_agent: None,
            max_body_size: None,
        }
    }
}

/// HTTP client builder
pub struct ClientBuilder<C = RawCodec> {
    base_url: Option<String>,
    headers: HeaderMap,
    options: RequestOptions,
    user_agent: Option<String>,
    codec: C,
    decorators: Vec<Decorator<C>>,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::with_codec(RawCodec)
    }
}

impl<C> fmt::Debug for ClientBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("options", &self.options)
            .field("user_agent", &self.user_agent)
            .field("decorators", &self.decorators.len())
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Builder initialized from a [`ClientConfig`]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::default().config(config)
    }
}

impl<C> ClientBuilder<C> {
    /// Builder whose clients encode [`RequestBuilder::payload`] with `codec`
    pub fn with_codec(codec: C) -> Self {
        Self {
            base_url: None,
            headers: HeaderMap::new(),
            options: RequestOptions {
                connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
                read_timeout: Some(DEFAULT_READ_TIMEOUT),
                redirect: RedirectPolicy::default(),
                max_body_size: None,
            },
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            codec,
            decorators: Vec::new(),
            transport: None,
        }
    }

    /// Apply every setting of `config`
    pub fn config(mut self, config: &ClientConfig) -> Self {
        if let Some(base_url) = &config.base_url {
            self.base_url = Some(base_url.to_string());
        }
        for (name, value) in &config.headers {
            self.headers.set(name.as_str(), value.as_str());
        }
        if let Some(ms) = config.connect_timeout_ms {
            self.options.connect_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = config.read_timeout_ms {
            self.options.read_timeout = Some(Duration::from_millis(ms));
        }
        self.options.redirect = RedirectPolicy {
            follow: config.follow_redirects,
            max_redirects: config.max_redirects,
            downgrade_post: config.downgrade_post,
        };
        if let Some(user_agent) = &config.user_agent {
            self.user_agent = Some(user_agent.clone());
        }
        if let Some(limit) = config.max_body_size {
            self.options.max_body_size = Some(limit);
        }
        self
    }

    /// Set the base URL; a trailing `/` is dropped
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a header sent with every request, replacing an earlier default
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Set the read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.options.read_timeout = Some(timeout);
        self
    }

    /// Enable or disable following redirects
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.options.redirect.follow = follow;
        self
    }

    /// Set the maximum number of redirect hops
    pub fn max_redirects(mut self, max_redirects: u32) -> Self {
        self.options.redirect.max_redirects = max_redirects;
        self
    }

    /// Whether 301/302/303 turn a POST into a body-less GET
    pub fn downgrade_post(mut self, downgrade: bool) -> Self {
        self.options.redirect.downgrade_post = downgrade;
        self
    }

    /// Set the `User-Agent` header, `None` to send none
    pub fn user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Bound the size of buffered response bodies
    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.options.max_body_size = Some(limit);
        self
    }

    /// Register a hook run on every new request builder, in registration order
    pub fn decorator<F>(mut self, decorator: F) -> Self
    where
        F: Fn(RequestBuilder<C>) -> RequestBuilder<C> + Send + Sync + 'static,
    {
        self.decorators.push(Arc::new(decorator));
        self
    }

    /// Use a custom transport instead of [`TcpTransport`]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the HTTP client
    pub fn build(self) -> Result<Client<C>> {
        let base_url = match self.base_url {
            Some(raw) => Some(parse_base_url(&raw)?),
            None => None,
        };

        let mut headers = self.headers;
        if let Some(user_agent) = self.user_agent {
            if !headers.contains("User-Agent") {
                headers.set("User-Agent", user_agent);
            }
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(TcpTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url,
                headers,
                options: self.options,
                codec: self.codec,
                decorators: self.decorators,
                executor: Executor::new(transport),
            }),
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HttpError::Build(format!(
            "unsupported base URL scheme: {}",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() {
        return Err(HttpError::Build(format!("not a base URL: {}", raw)));
    }
    Ok(url)
}

//! Immutable request values

use std::time::Duration;

use url::Url;

use crate::content_type::ContentType;
use crate::headers::HeaderMap;
use crate::method::Method;

/// Default number of redirect hops followed before giving up
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Encoded request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    /// Declared media type
    pub content_type: ContentType,
    /// Encoded bytes
    pub bytes: Vec<u8>,
}

/// How redirect responses are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    /// Follow 301/302/303/307/308 responses carrying a `Location`
    pub follow: bool,
    /// Maximum number of hops
    pub max_redirects: u32,
    /// Rewrite POST to a body-less GET on 301/302/303
    pub downgrade_post: bool,
}

impl RedirectPolicy {
    /// Never follow redirects; 3xx responses are returned to the caller
    pub fn none() -> Self {
        Self {
            follow: false,
            ..Self::default()
        }
    }

    /// Follow up to `max_redirects` hops
    pub fn limited(max_redirects: u32) -> Self {
        Self {
            max_redirects,
            ..Self::default()
        }
    }
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            follow: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            downgrade_post: true,
        }
    }
}

/// Per-request execution settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    /// Budget for establishing the connection
    pub connect_timeout: Option<Duration>,
    /// Budget for reading the whole response once the request is sent
    pub read_timeout: Option<Duration>,
    /// Redirect handling
    pub redirect: RedirectPolicy,
    /// Upper bound for a buffered response body
    pub max_body_size: Option<usize>,
}

/// A fully resolved HTTP request
///
/// Built by [`RequestBuilder::build`](crate::RequestBuilder::build) and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Body>,
    pub(crate) options: RequestOptions,
}

impl Request {
    /// Request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Target URL with the encoded query string
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers, defaults already merged in
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Encoded body, if any
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Execution settings
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// The request to send after a redirect to `location`
    ///
    /// 307 and 308 keep the method and body. 301, 302 and 303 turn a POST
    /// into a GET without body when the policy asks for it. Credentials are
    /// dropped when the origin changes.
    pub(crate) fn redirected(&self, status: u16, location: Url) -> Request {
        let mut next = self.clone();

        if matches!(status, 301 | 302 | 303)
            && self.method == Method::Post
            && self.options.redirect.downgrade_post
        {
            next.method = Method::Get;
            next.body = None;
            next.headers.remove("Content-Type");
        }

        if location.origin() != self.url.origin() {
            next.headers.remove("Authorization");
            next.headers.remove("Cookie");
        }

        // Host is derived from the target on every hop
        next.headers.remove("Host");
        next.url = location;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_request() -> Request {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "application/json");
        headers.set("Authorization", "Bearer secret");
        Request {
            method: Method::Post,
            url: Url::parse("http://host/old").expect("valid url"),
            headers,
            body: Some(Body {
                content_type: ContentType::new(ContentType::JSON),
                bytes: b"{}".to_vec(),
            }),
            options: RequestOptions::default(),
        }
    }

    #[test]
    fn test_redirect_302_downgrades_post() {
        let request = post_request();
        let next = request.redirected(302, Url::parse("http://host/new").expect("valid url"));

        assert_eq!(next.method(), Method::Get);
        assert!(next.body().is_none());
        assert!(!next.headers().contains("content-type"));
        assert_eq!(next.headers().get("authorization"), Some("Bearer secret"));
        assert_eq!(next.url().as_str(), "http://host/new");
    }

    #[test]
    fn test_redirect_307_keeps_method_and_body() {
        let request = post_request();
        let next = request.redirected(307, Url::parse("http://host/new").expect("valid url"));

        assert_eq!(next.method(), Method::Post);
        assert_eq!(next.body(), request.body());
    }

    #[test]
    fn test_redirect_without_downgrade() {
        let mut request = post_request();
        request.options.redirect.downgrade_post = false;
        let next = request.redirected(301, Url::parse("http://host/new").expect("valid url"));

        assert_eq!(next.method(), Method::Post);
        assert!(next.body().is_some());
    }

    #[test]
    fn test_cross_origin_redirect_drops_credentials() {
        let request = post_request();
        let next = request.redirected(
            307,
            Url::parse("http://other.example/new").expect("valid url"),
        );

        assert!(!next.headers().contains("authorization"));
    }
}

use std::fmt;

use http::{header::AsHeaderName, HeaderMap, HeaderValue, Method, Uri};

/// A borrowed view of the parts of an HTTP request that authorization
/// decisions may inspect
///
/// The view can be taken from an [`http::Request`] with any body type, or
/// from its [`Parts`](http::request::Parts).
#[derive(Clone, Copy)]
pub struct ResourceRequest<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
}

impl<'a> ResourceRequest<'a> {
    /// Constructs a view from its components
    #[inline]
    pub const fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    /// The request method
    #[inline]
    pub const fn method(&self) -> &'a Method {
        self.method
    }

    /// The request URI
    #[inline]
    pub const fn uri(&self) -> &'a Uri {
        self.uri
    }

    /// All request headers
    #[inline]
    pub const fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    /// Looks up a header by name, case-insensitively
    ///
    /// If the header was sent more than once, the first value is returned.
    #[inline]
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&'a HeaderValue> {
        self.headers.get(name)
    }
}

impl<'a, B> From<&'a http::Request<B>> for ResourceRequest<'a> {
    #[inline]
    fn from(request: &'a http::Request<B>) -> Self {
        Self::new(request.method(), request.uri(), request.headers())
    }
}

impl<'a> From<&'a http::request::Parts> for ResourceRequest<'a> {
    #[inline]
    fn from(parts: &'a http::request::Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }
}

// Header values may carry credentials, so only the names are shown
impl fmt::Debug for ResourceRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ResourceRequest")
            .field("method", self.method)
            .field("uri", self.uri)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

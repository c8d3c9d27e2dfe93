//! What gets dispatched and where it is sent.

use onion_supervisor::Endpoint;
use url::Url;

/// A fetch accepted by the router
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTarget {
    url: Url,
}

impl FetchTarget {
    /// Wrap a parsed URL
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Parse `input` into a target
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(Self::new)
    }

    /// The full URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host component, if the URL has one
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

impl From<Url> for FetchTarget {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// How a fetch is carried out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Through the local SOCKS port of a running onion service
    Proxied(Endpoint),
    /// No running service was bound at execution time
    Unrouted,
}

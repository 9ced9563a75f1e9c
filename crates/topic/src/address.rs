//! Websocket addresses of topic endpoints
//!
//! An address looks like `ws://host:port[/group]`. The optional single path
//! segment names the consumer group a client reads as; servers ignore it
//! when binding.

use std::borrow::Cow;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::{Host, Url};

use crate::Error;

/// Scheme used when none is configured.
pub const DEFAULT_SCHEME: &str = "ws";

/// A parsed, hierarchical websocket URL with a host.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicAddress(Url);

impl TopicAddress {
    /// Parse an address, rejecting URLs without a host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `input` is not a usable address.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let url = Url::parse(input).map_err(|e| Error::InvalidAddress(format!("{input}: {e}")))?;

        if url.cannot_be_a_base() || url.host().is_none() || url.scheme() == "file" {
            return Err(Error::InvalidAddress(format!("{input}: missing host")));
        }
        if url.port_or_known_default().is_none() {
            return Err(Error::InvalidAddress(format!("{input}: missing port")));
        }

        Ok(Self(url))
    }

    /// An address on `ip` with port 0, to be resolved once a server binds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `scheme` is not a valid scheme.
    pub fn unbound(scheme: &str, ip: IpAddr) -> Result<Self, Error> {
        Self::parse(&format!("{scheme}://{}", SocketAddr::new(ip, 0)))
    }

    /// Same scheme and path, new host and port.
    #[must_use]
    pub fn with_socket_addr(&self, addr: SocketAddr) -> Self {
        let mut url = self.0.clone();
        // parse() guarantees a hierarchical url with a host, both setters succeed
        let _ = url.set_ip_host(addr.ip());
        let _ = url.set_port(Some(addr.port()));
        Self(url)
    }

    /// Same host and port, reading as `group`.
    #[must_use]
    pub fn with_group(&self, group: &str) -> Self {
        let mut url = self.0.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().push(group);
        }
        Self(url)
    }

    /// Same host and port, with the group removed.
    #[must_use]
    pub fn without_group(&self) -> Self {
        let mut url = self.0.clone();
        url.set_path("");
        Self(url)
    }

    /// The URL scheme, usually `ws`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// The port, falling back to the scheme default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.0.port_or_known_default().unwrap_or_default()
    }

    /// The host as written, IPv6 literals keep their brackets.
    #[must_use]
    pub fn host_str(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// The consumer group named by the first path segment, if any.
    #[must_use]
    pub fn group(&self) -> Option<Cow<'_, str>> {
        self.0
            .path_segments()?
            .find(|segment| !segment.is_empty())
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy())
    }

    /// Resolve the host to a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolve`] if a domain host has no addresses.
    pub async fn resolve(&self) -> Result<SocketAddr, Error> {
        let port = self.port();
        match self.0.host() {
            Some(Host::Ipv4(ip)) => Ok(SocketAddr::new(IpAddr::V4(ip), port)),
            Some(Host::Ipv6(ip)) => Ok(SocketAddr::new(IpAddr::V6(ip), port)),
            Some(Host::Domain(domain)) => tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| Error::Resolve(format!("{domain}: {e}")))?
                .next()
                .ok_or_else(|| Error::Resolve(domain.to_string())),
            None => Err(Error::Resolve(self.to_string())),
        }
    }

    /// The address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Url always serializes an empty hierarchical path as "/"
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}

impl FromStr for TopicAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

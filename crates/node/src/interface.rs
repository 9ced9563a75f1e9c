use std::convert::Infallible;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::Error;

/// Where a node binds its topic servers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Interface {
    /// `127.0.0.1`.
    #[default]
    Loopback,
    /// The first address of a named OS interface, IPv4 preferred.
    Name(String),
    /// A literal address.
    Address(IpAddr),
}

impl Interface {
    /// The IP to bind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interface`] if a named interface does not exist or
    /// has no address.
    pub fn resolve(&self) -> Result<IpAddr, Error> {
        match self {
            Self::Loopback => Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            Self::Address(ip) => Ok(*ip),
            Self::Name(name) => if_addrs::get_if_addrs()
                .map_err(|e| Error::Interface(format!("{name}: {e}")))?
                .into_iter()
                .filter(|iface| iface.name == *name)
                .map(|iface| iface.ip())
                .min_by_key(IpAddr::is_ipv6)
                .ok_or_else(|| Error::Interface(format!("{name}: no such interface"))),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loopback => f.write_str("loopback"),
            Self::Name(name) => f.write_str(name),
            Self::Address(ip) => write!(f, "{ip}"),
        }
    }
}

impl FromStr for Interface {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "loopback" {
            return Ok(Self::Loopback);
        }
        Ok(s.parse::<IpAddr>()
            .map_or_else(|_| Self::Name(s.to_string()), Self::Address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("loopback".parse::<Interface>().unwrap(), Interface::Loopback);
        assert_eq!(
            "10.0.0.7".parse::<Interface>().unwrap(),
            Interface::Address("10.0.0.7".parse().unwrap())
        );
        assert_eq!(
            "eth0".parse::<Interface>().unwrap(),
            Interface::Name("eth0".to_string())
        );
    }

    #[test]
    fn test_resolve() {
        assert_eq!(
            Interface::Loopback.resolve().unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert!(
            Interface::Name("definitely-not-an-interface0".to_string())
                .resolve()
                .is_err()
        );
    }
}

use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The mDNS daemon failed.
    #[error(transparent)]
    Mdns(#[from] mdns_sd::Error),

    /// The registry was used before `start`.
    #[error("mdns registry not started")]
    NotStarted,

    /// A record had no address to announce.
    #[error("service {0} has no address")]
    NoAddress(String),
}

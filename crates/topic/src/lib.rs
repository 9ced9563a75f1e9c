//! Topic streams over websockets.
//!
//! A topic is an append-only log read through consumer-group cursors
//! ([`TopicQueue`]). Records cross the network with a one-in-flight credit
//! protocol: the reading side sends a ready frame, the writing side answers
//! with exactly one record. Each endpoint combines a connection kind
//! ([`TopicServer`] or [`TopicClient`]) with a stream role ([`Writeable`]
//! or [`Redeable`]).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod address;
mod client;
mod config;
mod endpoint;
mod error;
mod queue;
mod server;

pub mod frame;
pub mod role;
pub mod socket;

pub use address::{DEFAULT_SCHEME, TopicAddress};
pub use client::TopicClient;
pub use config::TopicConfig;
pub use endpoint::{RedeableClient, RedeableServer, WriteableClient, WriteableServer};
pub use error::Error;
pub use queue::TopicQueue;
pub use role::{Flow, Redeable, StreamRole, Writeable};
pub use server::TopicServer;

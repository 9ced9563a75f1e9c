//! Lifecycle contract for long-running topicmesh services.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;

/// Marker trait for errors raised while booting or shutting down a service.
pub trait BootableError: Debug + Error + Send + Sync + 'static {}

/// A service that can be started, shut down, and awaited.
///
/// Implementors are expected to tolerate `shutdown` being called on a service
/// that was never started.
#[async_trait]
pub trait Bootable
where
    Self: Send + Sync + 'static,
{
    /// The error type raised by lifecycle operations.
    type Error: BootableError;

    /// Human readable service name, used in logs.
    fn name(&self) -> String;

    /// Start the service.
    async fn start(&self) -> Result<(), Self::Error>;

    /// Stop the service and release its sockets.
    async fn shutdown(&self) -> Result<(), Self::Error>;

    /// Resolve once the service has nothing left running.
    async fn wait(&self);
}

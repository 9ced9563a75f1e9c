//! Topic hosting and deployment for one process.
//!
//! A [`TopicNode`] hosts topics and announces them; a [`TopicConnector`]
//! dials topics hosted elsewhere; an [`Executable`] runs a [`Worker`]
//! against the resulting handles.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod connector;
mod error;
mod executable;
mod interface;
mod node;

pub use config::NodeConfig;
pub use connector::{TopicBinding, TopicConnector, TopicHandle, TopicHandles};
pub use error::Error;
pub use executable::{ExceptionSink, Executable, Parameters, Worker, WorkerError};
pub use interface::Interface;
pub use node::TopicNode;

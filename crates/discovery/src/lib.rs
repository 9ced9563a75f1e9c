//! Topic discovery over a local-network service registry.
//!
//! A [`Moderator`] announces the endpoints of local topics and a
//! [`Witness`] finds the ones announced by others. Both talk to a
//! [`ServiceRegistry`] backend; records that do not carry the topic marker
//! are ignored.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod moderator;
mod record;
mod registry;
mod witness;

pub use error::Error;
pub use moderator::Moderator;
pub use record::{
    MARKER_PROPERTY, ROLE_PROPERTY, Role, SCHEME_PROPERTY, SERVICE_TYPE, ServiceRecord,
    TOPIC_PROPERTY, TopicRecord,
};
pub use registry::ServiceRegistry;
pub use witness::{Witness, WitnessConfig};

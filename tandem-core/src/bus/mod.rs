//! Bus abstraction for simulator coordination
//!
//! This module provides the transport the controller talks through:
//! - Publish/subscribe topics (pose updates in, velocity commands out)
//! - Request/response services (spawn, set-pen)
//!
//! Only an in-process backend ships here; it stands in for the simulator's
//! middleware in the CLI and in tests.

mod error;
mod local;
mod message;
mod traits;

pub use error::BusError;
pub use local::{DEFAULT_QUEUE_DEPTH, LocalBus};
pub use message::BusMessage;
pub use traits::{Bus, HandlerFuture, ServiceHandle, SubscriptionHandle};

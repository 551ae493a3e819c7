//! Commonly used actor types.
//!
//! Import this module to get started with the basic actor functionality.

pub use super::actor::{
    ActorConfig, // Worker name and mailbox capacity
    ActorError,  // Error types for actor requests
};
pub use super::context::Context; // Capabilities lent to a running operation
pub use super::endpoint::Endpoint; // An endpoint to communicate with an actor.
pub use super::id::Id; // An identifier type used for actors.
pub use super::operation::{
    Function,  // Receiver-less function for finishing deferred requests
    Operation, // Runtime-selectable operation on a receiver
};
pub use super::registry::Registry; // Name-keyed operation lookup
pub use super::reply::{Reply, ReplyError, ReplySink};
pub use super::response::{Fault, Response};
pub use super::signature::{DispatchError, Signature};
pub use super::supervisor::{Supervisor, start, start_with};
pub use super::value::{TypeInfo, Value, Values};

//! Actions riding on the live capture stream, including 3A metering.
//!
//! An action is a small state machine registered with the engine that owns
//! the running stream. The engine delivers every stream event to every live
//! action; an action leaves the live set the moment it completes.

mod action;
mod combinators;
pub mod meter;
mod registry;

#[cfg(test)]
mod testing;

pub use action::{Action, ActionBase, ActionCallback, ActionHolder, ActionState, CallbackId};
pub use combinators::{Timeout, Together};
pub use meter::{Meter, MeteringListener};
pub use registry::{ActionId, ActionRegistry};

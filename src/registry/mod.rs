//! Room membership directory
//!
//! The registry is the source of truth for "who is in this room". Each room
//! is guarded by its own lock so that joins and leaves on the same room are
//! serialized while different rooms proceed independently.

mod registry;
mod room;

pub use registry::{Departure, SessionRegistry};
pub use room::{Participant, Room};

//! Frame events.
//!
//! Sensors publish every finished frame to subscribers. A subscription lives
//! as long as its [`Connection`]; dropping the connection unsubscribes.

mod frame;

pub use frame::{Connection, FrameEvent, FrameInfo};

//! Render timing.
//!
//! Sensors time their first and second passes separately and report the sum
//! as the last render duration.

mod pass_timer;

pub use pass_timer::{PassTimer, RenderTiming};

//! The smallest common denominator between the other crates: logging setup and progress timing.
//! Nothing here knows about geometry or tiles.

#[macro_use]
extern crate log;

mod logger;
mod time;

pub use crate::logger::setup;
pub use crate::time::{elapsed_seconds, prettyprint_usize, Timer};

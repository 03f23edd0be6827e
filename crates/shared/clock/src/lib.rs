//! Hermes Clock Infrastructure
//!
//! Time abstraction used wherever the calendar matters (contract months,
//! daily log and stream file names):
//!
//! ```text
//! Clock (port)
//!   ├── SystemClock  wall clock, production
//!   └── FixedClock   pinned instant, tests and replays
//! ```

mod fixed;
mod port;

pub use fixed::FixedClock;
pub use port::{Clock, SystemClock};

//! Relay core: per-session lifecycle, directional copy loops, single-fire
//! termination, and periodic traffic accounting.

pub mod pipe;
pub mod reporter;
pub mod session;
pub mod terminator;

pub use pipe::Direction;
pub use reporter::TrafficReporter;
pub use session::{Session, SessionCounters};
pub use terminator::{Phase, Terminator};

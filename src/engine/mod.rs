//! Core engine: the poll -> value -> summarise loop.

pub mod clock;
pub mod session;
pub mod summary;
pub mod runner;

//! Domain models for the taawidaty engine.

mod medication;
mod search;

pub use medication::*;
pub use search::*;

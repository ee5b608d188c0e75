//! Core application primitives (clock, orchestrator, scheduler)

pub mod clock;
pub mod orchestrator;
pub mod scheduler;

pub use clock::*;
pub use orchestrator::*;
pub use scheduler::*;

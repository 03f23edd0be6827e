//! Simulated gateway front
//!
//! Answers requests from a script on its own delivery thread, one callback
//! at a time, the way a vendor front does. Used by tests and dry runs.

mod factory;
mod gateway;
mod script;

pub use factory::SimulatorFactory;
pub use gateway::SimulatedGateway;
pub use script::SimulatorScript;

//! Gateway adapters
//!
//! Implementations of the gateway port. Only the simulated front ships in
//! this workspace; native vendor bindings plug in through the same traits.

pub mod simulator;

pub use simulator::{SimulatedGateway, SimulatorFactory, SimulatorScript};

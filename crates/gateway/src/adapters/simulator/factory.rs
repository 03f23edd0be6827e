use std::path::Path;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::gateway::SimulatedGateway;
use super::script::SimulatorScript;
use crate::error::GatewayError;
use crate::port::{ApiKind, GatewayApi, GatewayFactory};

/// Creates [`SimulatedGateway`]s from one script
///
/// Keeps every created instance so tests can inject events into it.
#[derive(Default)]
pub struct SimulatorFactory {
    script: SimulatorScript,
    created: Mutex<Vec<Arc<SimulatedGateway>>>,
}

impl SimulatorFactory {
    pub fn new(script: SimulatorScript) -> Self {
        Self {
            script,
            created: Mutex::new(Vec::new()),
        }
    }

    /// Most recently created instance
    pub fn last(&self) -> Option<Arc<SimulatedGateway>> {
        self.created.lock().last().cloned()
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }
}

impl GatewayFactory for SimulatorFactory {
    fn create(
        &self,
        kind: ApiKind,
        stream_path: &Path,
        production_mode: bool,
    ) -> Result<Arc<dyn GatewayApi>, GatewayError> {
        debug!(
            "Creating simulated {:?} front (stream path {}, production {})",
            kind,
            stream_path.display(),
            production_mode
        );
        let gateway = Arc::new(SimulatedGateway::new(kind, self.script.clone()));
        self.created.lock().push(gateway.clone());
        Ok(gateway)
    }
}

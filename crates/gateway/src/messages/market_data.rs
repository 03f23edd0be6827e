//! Market-data front payloads

use hermes_core::MarketDataRecord;
use serde::{Deserialize, Serialize};

/// Depth market-data push as delivered by the front
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DepthMarketData {
    /// Snapshot fields, named as the front names them
    pub snapshot: MarketDataRecord,
    /// Not populated by every front
    pub exchange_id: Option<String>,
}

impl DepthMarketData {
    pub fn new(snapshot: MarketDataRecord) -> Self {
        Self {
            snapshot,
            exchange_id: None,
        }
    }

    pub fn with_exchange(mut self, exchange_id: impl Into<String>) -> Self {
        self.exchange_id = Some(exchange_id.into());
        self
    }

    pub fn instrument(&self) -> Option<&str> {
        self.snapshot.instrument()
    }
}

impl From<DepthMarketData> for MarketDataRecord {
    fn from(data: DepthMarketData) -> Self {
        data.snapshot
    }
}

/// Instrument echoed in a (un)subscribe reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificInstrument {
    pub instrument_id: String,
}

impl SpecificInstrument {
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
        }
    }
}

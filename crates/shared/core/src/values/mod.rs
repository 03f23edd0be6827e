use chrono::{DateTime, Utc};

/// Price value as delivered by the gateway (IEEE double on the wire)
pub type Price = f64;

/// Volume / lot count
pub type Volume = i32;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Per-session request correlation id (the vendor uses a signed 32-bit int)
pub type RequestId = i32;

//! Depth market-data snapshot, one per inbound tick.
//!
//! Field names follow the exchange gateway's own column names so that files
//! written by the row store can be read by other tooling without a mapping.

use serde::{Deserialize, Serialize};

use crate::fields::{ColumnType, FieldError, FieldValue, FromField};

macro_rules! column_type {
    (String) => {
        ColumnType::Text
    };
    (i32) => {
        ColumnType::Integer
    };
    (f64) => {
        ColumnType::Real
    };
}

macro_rules! flat_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $field:ident : $ty:tt => $column:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            $(
                #[serde(rename = $column)]
                pub $field: $ty,
            )*
        }

        impl $name {
            /// Column names and storage types, in persisted order
            pub const COLUMNS: &'static [(&'static str, ColumnType)] =
                &[ $( ($column, column_type!($ty)) ),* ];

            /// Flatten into cells, in [`Self::COLUMNS`] order
            pub fn to_fields(&self) -> Vec<FieldValue> {
                vec![ $( FieldValue::from(self.$field.clone()) ),* ]
            }

            /// Rebuild from cells in [`Self::COLUMNS`] order
            pub fn from_fields(fields: Vec<FieldValue>) -> Result<Self, FieldError> {
                if fields.len() != Self::COLUMNS.len() {
                    return Err(FieldError::Arity {
                        expected: Self::COLUMNS.len(),
                        found: fields.len(),
                    });
                }
                let mut cells = fields.into_iter();
                Ok(Self {
                    $(
                        $field: FromField::from_field(
                            cells.next().ok_or(FieldError::Missing($column))?,
                            $column,
                        )?,
                    )*
                })
            }
        }
    };
}

flat_record! {
    /// One depth snapshot for one instrument
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct MarketDataRecord {
        instrument_id: String => "InstrumentID",
        trading_day: String => "TradingDay",
        action_day: String => "ActionDay",
        update_time: String => "UpdateTime",
        update_millisec: i32 => "UpdateMillisec",
        last_price: f64 => "LastPrice",
        volume: i32 => "Volume",
        pre_settlement_price: f64 => "PreSettlementPrice",
        pre_close_price: f64 => "PreClosePrice",
        pre_open_interest: f64 => "PreOpenInterest",
        open_price: f64 => "OpenPrice",
        highest_price: f64 => "HighestPrice",
        lowest_price: f64 => "LowestPrice",
        limit_up_price: f64 => "LimitUpPrice",
        limit_down_price: f64 => "LimitDownPrice",
        open_interest: f64 => "OpenInterest",
        turnover: f64 => "Turnover",
        average_price: f64 => "AveragePrice",
        bid_price1: f64 => "BidPrice1",
        bid_volume1: i32 => "BidVolume1",
        ask_price1: f64 => "AskPrice1",
        ask_volume1: i32 => "AskVolume1",
        bid_price2: f64 => "BidPrice2",
        bid_volume2: i32 => "BidVolume2",
        ask_price2: f64 => "AskPrice2",
        ask_volume2: i32 => "AskVolume2",
        bid_price3: f64 => "BidPrice3",
        bid_volume3: i32 => "BidVolume3",
        ask_price3: f64 => "AskPrice3",
        ask_volume3: i32 => "AskVolume3",
        bid_price4: f64 => "BidPrice4",
        bid_volume4: i32 => "BidVolume4",
        ask_price4: f64 => "AskPrice4",
        ask_volume4: i32 => "AskVolume4",
        bid_price5: f64 => "BidPrice5",
        bid_volume5: i32 => "BidVolume5",
        ask_price5: f64 => "AskPrice5",
        ask_volume5: i32 => "AskVolume5",
    }
}

impl MarketDataRecord {
    /// Create an empty snapshot for an instrument
    pub fn new(instrument_id: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            ..Default::default()
        }
    }

    /// Builder: set last price and cumulative volume
    pub fn with_last(mut self, price: f64, volume: i32) -> Self {
        self.last_price = price;
        self.volume = volume;
        self
    }

    /// Builder: set the exchange timestamp fields
    pub fn with_time(mut self, trading_day: &str, update_time: &str, millis: i32) -> Self {
        self.trading_day = trading_day.to_string();
        self.action_day = trading_day.to_string();
        self.update_time = update_time.to_string();
        self.update_millisec = millis;
        self
    }

    /// Builder: set the top of book
    pub fn with_top_of_book(mut self, bid: f64, bid_volume: i32, ask: f64, ask_volume: i32) -> Self {
        self.bid_price1 = bid;
        self.bid_volume1 = bid_volume;
        self.ask_price1 = ask;
        self.ask_volume1 = ask_volume;
        self
    }

    /// Instrument id, or `None` when the gateway delivered an empty one
    pub fn instrument(&self) -> Option<&str> {
        let id = self.instrument_id.trim();
        if id.is_empty() { None } else { Some(id) }
    }

    /// Position of the instrument id column
    pub const INSTRUMENT_COLUMN: usize = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_follow_gateway_names() {
        let names: Vec<&str> = MarketDataRecord::COLUMNS.iter().map(|(n, _)| *n).collect();
        assert_eq!(names.len(), 38);
        assert_eq!(names[MarketDataRecord::INSTRUMENT_COLUMN], "InstrumentID");
        assert_eq!(&names[18..22], &["BidPrice1", "BidVolume1", "AskPrice1", "AskVolume1"]);
        assert_eq!(names[37], "AskVolume5");
    }

    #[test]
    fn test_fields_rebuild_record() {
        let record = MarketDataRecord::new("rb2601")
            .with_last(3512.0, 1200)
            .with_time("20251201", "09:00:01", 500)
            .with_top_of_book(3511.0, 12, 3513.0, 7);

        let fields = record.to_fields();
        assert_eq!(fields[0], FieldValue::Text("rb2601".into()));
        assert_eq!(fields[6], FieldValue::Integer(1200));

        let rebuilt = MarketDataRecord::from_fields(fields).unwrap();
        assert_eq!(rebuilt, record);
    }

    #[test]
    fn test_from_fields_checks_arity() {
        let err = MarketDataRecord::from_fields(vec![FieldValue::Text("rb2601".into())]);
        assert!(matches!(err, Err(FieldError::Arity { expected: 38, found: 1 })));
    }

    #[test]
    fn test_blank_instrument_is_none() {
        assert_eq!(MarketDataRecord::new("  ").instrument(), None);
        assert_eq!(MarketDataRecord::new("ag2602").instrument(), Some("ag2602"));
    }

    #[test]
    fn test_serde_uses_gateway_names() {
        let json = serde_json::to_value(MarketDataRecord::new("rb2601")).unwrap();
        assert_eq!(json["InstrumentID"], "rb2601");
        assert!(json.get("instrument_id").is_none());
    }
}

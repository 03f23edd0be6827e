use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Calendar month used in contract codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    /// 1-based month
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month())
    }

    /// Following month, wrapping December into January of the next year
    pub fn next(&self) -> Self {
        if self.month >= 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// `YYMM` suffix as used in contract codes ("2601" for January 2026)
    pub fn suffix(&self) -> String {
        format!("{:02}{:02}", self.year.rem_euclid(100), self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Which contract month a generated code stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractRole {
    /// Next month's contract, actively traded
    Speculative,
    /// Current month's contract, in delivery
    Delivery,
}

/// A tradable contract derived from the product catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRecord {
    /// Contract code (e.g., "rb2601")
    pub code: String,
    /// Exchange code (e.g., "SHFE")
    pub exchange: String,
    pub role: ContractRole,
}

impl ContractRecord {
    pub fn new(code: impl Into<String>, exchange: impl Into<String>, role: ContractRole) -> Self {
        Self {
            code: code.into(),
            exchange: exchange.into(),
            role,
        }
    }

    /// Product symbol of this contract ("rb" for "rb2601")
    pub fn symbol(&self) -> &str {
        symbol_prefix(&self.code)
    }
}

/// Leading alphabetic part of an instrument code
///
/// ```
/// assert_eq!(hermes_core::symbol_prefix("rb2601"), "rb");
/// assert_eq!(hermes_core::symbol_prefix("IF2512"), "IF");
/// ```
pub fn symbol_prefix(code: &str) -> &str {
    let end = code
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(code.len());
    &code[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_december_wraps_into_next_year() {
        let next = YearMonth::new(2025, 12).next();
        assert_eq!(next, YearMonth::new(2026, 1));
        assert_eq!(next.suffix(), "2601");
    }

    #[test]
    fn test_june_rolls_within_year() {
        assert_eq!(YearMonth::new(2025, 6).next(), YearMonth::new(2025, 7));
    }

    #[test]
    fn test_suffix_pads_year_and_month() {
        assert_eq!(YearMonth::new(2009, 3).suffix(), "0903");
        assert_eq!(YearMonth::new(2100, 11).suffix(), "0011");
    }

    #[test]
    fn test_symbol_prefix() {
        assert_eq!(symbol_prefix("rb2601"), "rb");
        assert_eq!(symbol_prefix("2601"), "");
        assert_eq!(symbol_prefix("SA"), "SA");

        let contract = ContractRecord::new("ag2512", "SHFE", ContractRole::Delivery);
        assert_eq!(contract.symbol(), "ag");
    }
}

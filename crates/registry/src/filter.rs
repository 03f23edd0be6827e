use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::error::ConfigError;
use crate::registry::ContractRegistry;

/// Which exchanges a market-data session covers
///
/// Parsed from `"all"` or a comma-separated list such as `"SHFE, DCE"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeFilter {
    All,
    /// De-duplicated, in the order given
    Only(Vec<String>),
}

impl ExchangeFilter {
    pub fn only<I, S>(exchanges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for exchange in exchanges {
            let exchange = exchange.into();
            if !selected.contains(&exchange) {
                selected.push(exchange);
            }
        }
        ExchangeFilter::Only(selected)
    }

    pub fn allows(&self, exchange: &str) -> bool {
        match self {
            ExchangeFilter::All => true,
            ExchangeFilter::Only(selected) => selected.iter().any(|e| e == exchange),
        }
    }

    /// Selected exchanges known to the registry, in registry order
    ///
    /// Names the catalog does not list are reported and left out.
    pub fn resolve(&self, registry: &ContractRegistry) -> Vec<String> {
        if let ExchangeFilter::Only(selected) = self {
            for unknown in selected.iter().filter(|e| !registry.exchanges().contains(*e)) {
                warn!("Exchange {unknown} is not in the product catalog, no data will be collected for it");
            }
        }
        registry
            .exchanges()
            .iter()
            .filter(|e| self.allows(e))
            .cloned()
            .collect()
    }
}

impl FromStr for ExchangeFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(ExchangeFilter::All);
        }
        let filter = ExchangeFilter::only(
            s.split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
        );
        match &filter {
            ExchangeFilter::Only(selected) if selected.is_empty() => Err(ConfigError::EmptyFilter),
            _ => Ok(filter),
        }
    }
}

impl fmt::Display for ExchangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeFilter::All => write!(f, "all"),
            ExchangeFilter::Only(selected) => write!(f, "{}", selected.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductCatalog;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_all_is_case_insensitive() {
        assert_eq!("ALL".parse::<ExchangeFilter>().unwrap(), ExchangeFilter::All);
        assert_eq!(" all ".parse::<ExchangeFilter>().unwrap(), ExchangeFilter::All);
    }

    #[test]
    fn test_parse_list_trims_and_dedups() {
        let filter: ExchangeFilter = " SHFE, DCE ,SHFE,".parse().unwrap();
        assert_eq!(filter, ExchangeFilter::Only(vec!["SHFE".into(), "DCE".into()]));
        assert_eq!(filter.to_string(), "SHFE,DCE");
        assert!(filter.allows("DCE"));
        assert!(!filter.allows("CZCE"));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(" , ".parse::<ExchangeFilter>(), Err(ConfigError::EmptyFilter)));
    }

    #[test]
    fn test_resolve_keeps_registry_order() {
        let catalog = ProductCatalog::new()
            .with_exchange("SHFE", &["rb"])
            .with_exchange("DCE", &["m"])
            .with_exchange("CZCE", &["SA"]);
        let registry =
            ContractRegistry::generate(&catalog, NaiveDate::from_ymd_opt(2025, 5, 5).unwrap()).unwrap();

        let filter: ExchangeFilter = "CZCE,SHFE,GFEX".parse().unwrap();
        assert_eq!(filter.resolve(&registry), vec!["SHFE", "CZCE"]);
        assert_eq!(ExchangeFilter::All.resolve(&registry), vec!["SHFE", "DCE", "CZCE"]);
    }
}

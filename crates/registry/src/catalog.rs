//! Static product catalog, grouped by exchange.
//!
//! ```yaml
//! SHFE:
//!   products:
//!     - "rb # rebar"
//!     - hc
//! DCE:
//!   products: [m, y]
//! ```
//!
//! Exchange and product order is preserved as written.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// One exchange's catalog entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExchangeEntry {
    #[serde(default)]
    pub name: Option<String>,
    /// Raw product entries, `abbr` optionally followed by `# label`
    #[serde(default)]
    pub products: Option<Vec<String>>,
}

/// A parsed product entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub abbreviation: String,
    pub label: Option<String>,
}

impl Product {
    /// Parse `"rb # rebar"` into abbreviation `rb` and label `rebar`
    pub fn parse(exchange: &str, entry: &str) -> Result<Self> {
        let (abbr, label) = match entry.split_once('#') {
            Some((abbr, label)) => (abbr.trim(), Some(label.trim())),
            None => (entry.trim(), None),
        };
        if abbr.is_empty() {
            return Err(ConfigError::EmptyAbbreviation {
                exchange: exchange.to_string(),
                entry: entry.to_string(),
            });
        }
        if !abbr.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidAbbreviation {
                exchange: exchange.to_string(),
                abbreviation: abbr.to_string(),
            });
        }
        Ok(Self {
            abbreviation: abbr.to_string(),
            label: label.filter(|l| !l.is_empty()).map(str::to_string),
        })
    }
}

/// Exchange code -> products
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ProductCatalog {
    exchanges: IndexMap<String, Option<ExchangeEntry>>,
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an exchange with its product entries
    pub fn with_exchange(mut self, exchange: &str, products: &[&str]) -> Self {
        self.exchanges.insert(
            exchange.to_string(),
            Some(ExchangeEntry {
                name: None,
                products: Some(products.iter().map(|p| p.to_string()).collect()),
            }),
        );
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Exchanges that list products, in catalog order
    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.exchanges
            .iter()
            .filter(|(_, entry)| entry.as_ref().is_some_and(|e| e.products.is_some()))
            .map(|(code, _)| code.as_str())
    }

    /// Parsed products of one exchange, in catalog order
    pub fn products(&self, exchange: &str) -> Result<Vec<Product>> {
        let entries = self
            .exchanges
            .get(exchange)
            .and_then(|e| e.as_ref())
            .and_then(|e| e.products.as_ref())
            .ok_or_else(|| ConfigError::UnknownExchange(exchange.to_string()))?;

        entries
            .iter()
            .map(|entry| Product::parse(exchange, entry))
            .collect()
    }

    pub fn contains_exchange(&self, exchange: &str) -> bool {
        self.exchanges().any(|code| code == exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_with_label() {
        let product = Product::parse("SHFE", "rb # rebar").unwrap();
        assert_eq!(product.abbreviation, "rb");
        assert_eq!(product.label.as_deref(), Some("rebar"));

        let bare = Product::parse("SHFE", "  hc ").unwrap();
        assert_eq!(bare.abbreviation, "hc");
        assert_eq!(bare.label, None);
    }

    #[test]
    fn test_empty_abbreviation_rejected() {
        let err = Product::parse("DCE", " # nothing").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAbbreviation { .. }));
    }

    #[test]
    fn test_invalid_abbreviation_rejected() {
        let err = Product::parse("DCE", "m-1").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAbbreviation { .. }));
    }

    #[test]
    fn test_yaml_preserves_order_and_skips_empty_exchanges() {
        let yaml = r#"
SHFE:
  name: Shanghai Futures Exchange
  products:
    - "rb # rebar"
    - "ag # silver"
CFFEX:
DCE:
  products: [m, y]
"#;
        let catalog = ProductCatalog::from_yaml_str(yaml).unwrap();
        let exchanges: Vec<&str> = catalog.exchanges().collect();
        assert_eq!(exchanges, vec!["SHFE", "DCE"]);

        let shfe: Vec<String> = catalog
            .products("SHFE")
            .unwrap()
            .into_iter()
            .map(|p| p.abbreviation)
            .collect();
        assert_eq!(shfe, vec!["rb", "ag"]);
        assert!(!catalog.contains_exchange("CFFEX"));
    }

    #[test]
    fn test_malformed_yaml_is_config_error() {
        let err = ProductCatalog::from_yaml_str("SHFE: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

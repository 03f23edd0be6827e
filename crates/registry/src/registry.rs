use std::collections::HashMap;

use chrono::NaiveDate;
use hermes_core::{ContractRecord, ContractRole, MarketDataRecord, YearMonth, symbol_prefix};
use log::{debug, info};

use crate::catalog::ProductCatalog;
use crate::error::{ConfigError, Result, RoutingError};
use crate::filter::ExchangeFilter;

/// Contract months derived from a calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractMonths {
    /// Next month
    pub speculative: YearMonth,
    /// Current month
    pub delivery: YearMonth,
}

/// Speculative and delivery months for the given date
pub fn contract_months(today: NaiveDate) -> ContractMonths {
    let delivery = YearMonth::from_date(today);
    ContractMonths {
        speculative: delivery.next(),
        delivery,
    }
}

/// Physical storage partition of an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub exchange: String,
    /// Alphabetic product prefix ("rb")
    pub symbol: String,
    /// Full instrument code ("rb2601")
    pub instrument: String,
}

impl Partition {
    fn new(exchange: &str, code: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol_prefix(code).to_string(),
            instrument: code.to_string(),
        }
    }
}

/// Currently tradable contracts and the code -> exchange routing table
///
/// Built once at startup from the product catalog and today's date; every
/// record reaching storage must route through [`ContractRegistry::route`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRegistry {
    generated_for: NaiveDate,
    months: ContractMonths,
    exchanges: Vec<String>,
    contracts: Vec<ContractRecord>,
    routes: HashMap<String, Partition>,
}

impl ContractRegistry {
    /// Derive contracts for `today`
    ///
    /// Per product the speculative code comes first, then the delivery code.
    /// Fails on empty or non-alphanumeric abbreviations and on a product
    /// listed under two exchanges.
    pub fn generate(catalog: &ProductCatalog, today: NaiveDate) -> Result<Self> {
        let months = contract_months(today);
        let spec_suffix = months.speculative.suffix();
        let delivery_suffix = months.delivery.suffix();

        let mut exchanges = Vec::new();
        let mut contracts = Vec::new();
        let mut routes = HashMap::new();
        let mut owners: HashMap<String, String> = HashMap::new();

        for exchange in catalog.exchanges() {
            exchanges.push(exchange.to_string());

            for product in catalog.products(exchange)? {
                if let Some(first) = owners.insert(product.abbreviation.clone(), exchange.to_string()) {
                    return Err(ConfigError::DuplicateProduct {
                        abbreviation: product.abbreviation,
                        first,
                        second: exchange.to_string(),
                    });
                }

                for (suffix, role) in [
                    (&spec_suffix, ContractRole::Speculative),
                    (&delivery_suffix, ContractRole::Delivery),
                ] {
                    let code = format!("{}{}", product.abbreviation, suffix);
                    routes.insert(code.clone(), Partition::new(exchange, &code));
                    contracts.push(ContractRecord::new(code, exchange, role));
                }
            }
        }

        info!(
            "Generated {} contracts across {} exchanges for {} (speculative {}, delivery {})",
            contracts.len(),
            exchanges.len(),
            today,
            months.speculative,
            months.delivery
        );

        Ok(Self {
            generated_for: today,
            months,
            exchanges,
            contracts,
            routes,
        })
    }

    /// Rebuild in place; returns true when the contract set changed
    pub fn regenerate(&mut self, catalog: &ProductCatalog, today: NaiveDate) -> Result<bool> {
        let next = Self::generate(catalog, today)?;
        let changed = next.contracts != self.contracts;
        if changed {
            debug!("Contract set changed on regeneration for {today}");
        }
        *self = next;
        Ok(changed)
    }

    pub fn generated_for(&self) -> NaiveDate {
        self.generated_for
    }

    pub fn months(&self) -> ContractMonths {
        self.months
    }

    /// Catalog exchanges, in catalog order
    pub fn exchanges(&self) -> &[String] {
        &self.exchanges
    }

    pub fn contracts(&self) -> &[ContractRecord] {
        &self.contracts
    }

    /// Every generated code (speculative and delivery)
    pub fn all(&self) -> Vec<&str> {
        self.contracts.iter().map(|c| c.code.as_str()).collect()
    }

    pub fn speculative(&self) -> Vec<&str> {
        self.codes_with_role(ContractRole::Speculative)
    }

    pub fn delivery(&self) -> Vec<&str> {
        self.codes_with_role(ContractRole::Delivery)
    }

    fn codes_with_role(&self, role: ContractRole) -> Vec<&str> {
        self.contracts
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.code.as_str())
            .collect()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.routes.contains_key(code)
    }

    pub fn exchange_of(&self, code: &str) -> Option<&str> {
        self.routes.get(code).map(|p| p.exchange.as_str())
    }

    pub fn route(&self, code: &str) -> std::result::Result<&Partition, RoutingError> {
        self.routes
            .get(code)
            .ok_or_else(|| RoutingError::UnknownInstrument(code.to_string()))
    }

    /// Route a record by its `InstrumentID`
    pub fn route_record(&self, record: &MarketDataRecord) -> std::result::Result<&Partition, RoutingError> {
        let code = record.instrument().ok_or(RoutingError::MissingInstrumentId)?;
        self.route(code)
    }

    /// Codes to subscribe to for the selected exchanges, in registry order
    pub fn subscription_list(&self, filter: &ExchangeFilter) -> Vec<String> {
        self.contracts
            .iter()
            .filter(|c| filter.allows(&c.exchange))
            .map(|c| c.code.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

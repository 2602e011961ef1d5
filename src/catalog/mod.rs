//! Reference Catalogs
//!
//! Read-only lists of tradable instruments and market event templates. Loaded
//! once, validated, then shared by handle with every run. A catalog that fails
//! validation is fatal: there is nothing to simulate without it.

use crate::error::CatalogError;
use crate::events::{EventKind, MarketEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BUILTIN_INSTRUMENTS: &str = include_str!("../../data/instruments.yaml");
const BUILTIN_EVENTS: &str = include_str!("../../data/events.yaml");

/// Industry tag of an instrument. Drives the flavour of filler headlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Technology,
    Healthcare,
    Energy,
    Financial,
    Consumer,
    Automotive,
    Education,
    #[serde(other)]
    Other,
}

/// A tradable equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub name: String,
    pub sector: Sector,
    /// Opening price; also anchors the absolute price band for the run
    pub base_price: f64,
    /// Display hint only
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

fn default_volatility() -> f64 {
    0.02
}

/// Validated instrument and event reference data.
#[derive(Debug, Clone)]
pub struct Catalog {
    instruments: Vec<Instrument>,
    events: Vec<MarketEvent>,
}

impl Catalog {
    /// Build a catalog, rejecting malformed data.
    pub fn new(instruments: Vec<Instrument>, events: Vec<MarketEvent>) -> Result<Self, CatalogError> {
        if instruments.is_empty() {
            return Err(CatalogError::Empty("instruments"));
        }
        if events.is_empty() {
            return Err(CatalogError::Empty("events"));
        }

        let mut tickers = HashSet::new();
        for instrument in &instruments {
            if !tickers.insert(instrument.ticker.as_str()) {
                return Err(CatalogError::DuplicateTicker(instrument.ticker.clone()));
            }
            if !(instrument.base_price.is_finite() && instrument.base_price > 0.0) {
                return Err(CatalogError::InvalidBasePrice {
                    ticker: instrument.ticker.clone(),
                    price: instrument.base_price,
                });
            }
        }

        let mut ids = HashSet::new();
        for event in &events {
            if !ids.insert(event.id.as_str()) {
                return Err(CatalogError::DuplicateEvent(event.id.clone()));
            }
            if let Some(ticker) = event.affected.iter().find(|t| !tickers.contains(t.as_str())) {
                return Err(CatalogError::UnknownTicker {
                    event: event.id.clone(),
                    ticker: ticker.clone(),
                });
            }
        }

        Ok(Self {
            instruments,
            events,
        })
    }

    /// Parse both catalogs from YAML documents
    pub fn from_yaml_str(instruments: &str, events: &str) -> Result<Self, CatalogError> {
        let instruments: Vec<Instrument> = serde_yaml::from_str(instruments)?;
        let events: Vec<MarketEvent> = serde_yaml::from_str(events)?;
        Self::new(instruments, events)
    }

    /// Load both catalogs from YAML files
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        instruments: P,
        events: Q,
    ) -> Result<Self, CatalogError> {
        let instruments = fs::read_to_string(instruments)?;
        let events = fs::read_to_string(events)?;
        Self::from_yaml_str(&instruments, &events)
    }

    /// The ten-stock, 280-event catalog compiled into the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUILTIN_INSTRUMENTS, BUILTIN_EVENTS)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    pub fn events(&self) -> &[MarketEvent] {
        &self.events
    }

    pub fn instrument(&self, ticker: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.ticker == ticker)
    }

    pub fn event(&self, id: &str) -> Option<&MarketEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn events_by_kind(&self, kind: EventKind) -> impl Iterator<Item = &MarketEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn events_affecting<'a>(&'a self, ticker: &'a str) -> impl Iterator<Item = &'a MarketEvent> {
        self.events.iter().filter(move |e| e.affects(ticker))
    }
}

//! Failure kinds surfaced by the simulation.
//!
//! Trade commands never panic on a business-rule violation. They return a
//! [`TradeError`] and leave the run untouched, so a caller can re-prompt and
//! retry.

use crate::calendar::Hour;
use serde::Serialize;
use thiserror::Error;

/// Rejected trade, option or watchlist command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("Insufficient funds: required ${required:.2}, available ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: u64, held: u64 },

    #[error("Stock not found: {ticker}")]
    UnknownInstrument { ticker: String },

    #[error("No option position {index} on {ticker}")]
    OptionNotFound { ticker: String, index: usize },

    #[error("Option position {index} on {ticker} expired at hour {expired_at}")]
    OptionExpired {
        ticker: String,
        index: usize,
        expired_at: Hour,
    },

    #[error("Quantity must be greater than zero")]
    InvalidQuantity,

    #[error("Invalid order: {reason}")]
    InvalidOrder { reason: String },
}

/// Fieldless discriminator for [`TradeError`], handy for matching at a
/// presentation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeErrorKind {
    InsufficientFunds,
    InsufficientShares,
    NotFound,
    Expired,
    InvalidOrder,
}

impl TradeError {
    pub fn kind(&self) -> TradeErrorKind {
        match self {
            TradeError::InsufficientFunds { .. } => TradeErrorKind::InsufficientFunds,
            TradeError::InsufficientShares { .. } => TradeErrorKind::InsufficientShares,
            TradeError::UnknownInstrument { .. } | TradeError::OptionNotFound { .. } => {
                TradeErrorKind::NotFound
            }
            TradeError::OptionExpired { .. } => TradeErrorKind::Expired,
            TradeError::InvalidQuantity | TradeError::InvalidOrder { .. } => {
                TradeErrorKind::InvalidOrder
            }
        }
    }
}

/// Reference data could not be loaded. Fatal: a run cannot start without it.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Catalog has no {0}")]
    Empty(&'static str),

    #[error("Duplicate ticker: {0}")]
    DuplicateTicker(String),

    #[error("Duplicate event id: {0}")]
    DuplicateEvent(String),

    #[error("Instrument {ticker} has invalid base price {price}")]
    InvalidBasePrice { ticker: String, price: f64 },

    #[error("Event {event} references unknown ticker {ticker}")]
    UnknownTicker { event: String, ticker: String },
}

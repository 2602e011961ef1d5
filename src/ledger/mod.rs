//! Position Ledger
//!
//! Cash, equity holdings, option holdings and the permanent trade log.
//! Every command validates first and mutates second, so a rejected command
//! leaves the ledger exactly as it was.
//!
//! The ledger knows nothing about the market: callers pass the execution price
//! and the current hour in.

use crate::calendar::Hour;
use crate::error::TradeError;
use crate::pricing::{self, OptionType, CONTRACT_MULTIPLIER};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Shares held in one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPosition {
    pub ticker: String,
    pub shares: u64,
    /// Volume-weighted average cost per share
    pub avg_cost: f64,
}

impl EquityPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.avg_cost) * self.shares as f64
    }
}

/// A long call or put. Immutable once opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPosition {
    pub ticker: String,
    pub option_type: OptionType,
    pub contracts: u32,
    pub strike: f64,
    /// Premium paid per underlying unit
    pub premium: f64,
    /// Absolute hour at which the option stops counting
    pub expiration_hour: Hour,
    pub purchase_hour: Hour,
}

impl OptionPosition {
    pub fn is_expired(&self, hour: Hour) -> bool {
        self.expiration_hour <= hour
    }

    /// Intrinsic value of the whole position at `spot`
    pub fn market_value(&self, spot: f64) -> f64 {
        self.option_type.intrinsic_value(spot, self.strike) * self.contracts as f64 * CONTRACT_MULTIPLIER
    }

    /// What was paid to open the position
    pub fn cost(&self) -> f64 {
        pricing::contract_cost(self.premium, self.contracts)
    }
}

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeAction {
    Buy,
    Sell,
    OpenCall,
    OpenPut,
    CloseOption,
}

impl TradeAction {
    pub fn is_option(self) -> bool {
        matches!(
            self,
            TradeAction::OpenCall | TradeAction::OpenPut | TradeAction::CloseOption
        )
    }
}

/// Entry in the append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub ticker: String,
    pub action: TradeAction,
    /// Shares, or contracts for option entries
    pub quantity: u64,
    /// Share price, premium per unit on open, or intrinsic value per unit on close
    pub price: f64,
    pub hour: Hour,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strike: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_hour: Option<Hour>,
}

impl TradeRecord {
    /// Cash that changed hands
    pub fn notional(&self) -> f64 {
        let units = if self.action.is_option() {
            self.quantity as f64 * CONTRACT_MULTIPLIER
        } else {
            self.quantity as f64
        };
        units * self.price
    }
}

/// Cash and holdings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    cash: f64,
    starting_cash: f64,
    positions: BTreeMap<String, EquityPosition>,
    options: BTreeMap<String, Vec<OptionPosition>>,
    watchlist: BTreeSet<String>,
    trades: Vec<TradeRecord>,
}

impl Ledger {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: starting_cash,
            starting_cash,
            positions: BTreeMap::new(),
            options: BTreeMap::new(),
            watchlist: BTreeSet::new(),
            trades: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn starting_cash(&self) -> f64 {
        self.starting_cash
    }

    pub fn positions(&self) -> &BTreeMap<String, EquityPosition> {
        &self.positions
    }

    pub fn position(&self, ticker: &str) -> Option<&EquityPosition> {
        self.positions.get(ticker)
    }

    pub fn shares_held(&self, ticker: &str) -> u64 {
        self.positions.get(ticker).map(|p| p.shares).unwrap_or(0)
    }

    pub fn options(&self) -> &BTreeMap<String, Vec<OptionPosition>> {
        &self.options
    }

    pub fn options_on(&self, ticker: &str) -> &[OptionPosition] {
        self.options.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn watchlist(&self) -> &BTreeSet<String> {
        &self.watchlist
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Buy `shares` at `price`
    pub fn buy(&mut self, ticker: &str, shares: u64, price: f64, hour: Hour) -> Result<TradeRecord, TradeError> {
        if shares == 0 {
            return Err(TradeError::InvalidQuantity);
        }
        let cost = shares as f64 * price;
        if cost > self.cash {
            return Err(TradeError::InsufficientFunds {
                required: cost,
                available: self.cash,
            });
        }

        let total_shares = self
            .shares_held(ticker)
            .checked_add(shares)
            .ok_or_else(|| TradeError::InvalidOrder {
                reason: format!("position in {} would exceed {} shares", ticker, u64::MAX),
            })?;

        let position = self
            .positions
            .entry(ticker.to_string())
            .or_insert_with(|| EquityPosition {
                ticker: ticker.to_string(),
                shares: 0,
                avg_cost: 0.0,
            });
        position.avg_cost =
            (position.shares as f64 * position.avg_cost + cost) / total_shares as f64;
        position.shares = total_shares;
        self.cash -= cost;

        debug!(ticker, shares, price, hour, cash = self.cash, "buy filled");
        Ok(self.record(TradeRecord {
            ticker: ticker.to_string(),
            action: TradeAction::Buy,
            quantity: shares,
            price,
            hour,
            strike: None,
            expiration_hour: None,
        }))
    }

    /// Sell `shares` at `price`. Average cost of the remainder is unchanged.
    pub fn sell(&mut self, ticker: &str, shares: u64, price: f64, hour: Hour) -> Result<TradeRecord, TradeError> {
        if shares == 0 {
            return Err(TradeError::InvalidQuantity);
        }
        let held = self.shares_held(ticker);
        if shares > held {
            return Err(TradeError::InsufficientShares {
                requested: shares,
                held,
            });
        }

        if held == shares {
            self.positions.remove(ticker);
        } else if let Some(position) = self.positions.get_mut(ticker) {
            position.shares -= shares;
        }
        self.cash += shares as f64 * price;

        debug!(ticker, shares, price, hour, cash = self.cash, "sell filled");
        Ok(self.record(TradeRecord {
            ticker: ticker.to_string(),
            action: TradeAction::Sell,
            quantity: shares,
            price,
            hour,
            strike: None,
            expiration_hour: None,
        }))
    }

    /// Buy `contracts` calls or puts expiring `expires_in` hours from `hour`.
    #[allow(clippy::too_many_arguments)]
    pub fn open_option(
        &mut self,
        ticker: &str,
        option_type: OptionType,
        contracts: u32,
        strike: f64,
        expires_in: Hour,
        spot: f64,
        hour: Hour,
        total_hours: Hour,
    ) -> Result<TradeRecord, TradeError> {
        if contracts == 0 {
            return Err(TradeError::InvalidQuantity);
        }
        if !(strike.is_finite() && strike > 0.0) {
            return Err(TradeError::InvalidOrder {
                reason: format!("strike must be positive, got {}", strike),
            });
        }
        if expires_in == 0 {
            return Err(TradeError::InvalidOrder {
                reason: "expiration must be at least one hour out".to_string(),
            });
        }
        if expires_in > total_hours {
            return Err(TradeError::InvalidOrder {
                reason: format!("expiration {} hours out is longer than the {}-hour run", expires_in, total_hours),
            });
        }
        let expiration_hour = hour.checked_add(expires_in).ok_or_else(|| TradeError::InvalidOrder {
            reason: format!("expiration {} hours after hour {} is out of range", expires_in, hour),
        })?;

        let premium = pricing::premium(option_type, spot, strike, expires_in, total_hours);
        let cost = pricing::contract_cost(premium, contracts);
        if cost > self.cash {
            return Err(TradeError::InsufficientFunds {
                required: cost,
                available: self.cash,
            });
        }

        let position = OptionPosition {
            ticker: ticker.to_string(),
            option_type,
            contracts,
            strike,
            premium,
            expiration_hour,
            purchase_hour: hour,
        };
        self.options
            .entry(ticker.to_string())
            .or_default()
            .push(position);
        self.cash -= cost;

        debug!(ticker, ?option_type, contracts, strike, premium, expires_at = expiration_hour, "option opened");
        Ok(self.record(TradeRecord {
            ticker: ticker.to_string(),
            action: match option_type {
                OptionType::Call => TradeAction::OpenCall,
                OptionType::Put => TradeAction::OpenPut,
            },
            quantity: contracts as u64,
            price: premium,
            hour,
            strike: Some(strike),
            expiration_hour: Some(expiration_hour),
        }))
    }

    /// Sell the `index`-th option on `ticker` back at intrinsic value.
    pub fn close_option(&mut self, ticker: &str, index: usize, spot: f64, hour: Hour) -> Result<TradeRecord, TradeError> {
        let position = self
            .options
            .get(ticker)
            .and_then(|list| list.get(index))
            .ok_or_else(|| TradeError::OptionNotFound {
                ticker: ticker.to_string(),
                index,
            })?;
        if position.is_expired(hour) {
            return Err(TradeError::OptionExpired {
                ticker: ticker.to_string(),
                index,
                expired_at: position.expiration_hour,
            });
        }

        let intrinsic = position.option_type.intrinsic_value(spot, position.strike);
        let proceeds = position.market_value(spot);

        let list = self.options.entry(ticker.to_string()).or_default();
        let position = list.remove(index);
        if list.is_empty() {
            self.options.remove(ticker);
        }
        self.cash += proceeds;

        debug!(ticker, index, intrinsic, proceeds, "option closed");
        Ok(self.record(TradeRecord {
            ticker: ticker.to_string(),
            action: TradeAction::CloseOption,
            quantity: position.contracts as u64,
            price: intrinsic,
            hour,
            strike: Some(position.strike),
            expiration_hour: Some(position.expiration_hour),
        }))
    }

    /// Drop every option whose expiration hour has been reached.
    ///
    /// Expired options are not settled; they simply stop counting.
    pub fn expire_options(&mut self, hour: Hour) -> Vec<OptionPosition> {
        let mut expired = Vec::new();
        for list in self.options.values_mut() {
            let (gone, kept): (Vec<_>, Vec<_>) =
                list.drain(..).partition(|o| o.is_expired(hour));
            *list = kept;
            expired.extend(gone);
        }
        self.options.retain(|_, list| !list.is_empty());
        for option in &expired {
            debug!(ticker = %option.ticker, strike = option.strike, hour, "option expired");
        }
        expired
    }

    /// Flip watchlist membership. Returns whether the ticker is now watched.
    pub fn toggle_watchlist(&mut self, ticker: &str) -> bool {
        if self.watchlist.remove(ticker) {
            false
        } else {
            self.watchlist.insert(ticker.to_string());
            true
        }
    }

    /// Cash plus equity at market plus live options at intrinsic value.
    pub fn portfolio_value<F>(&self, hour: Hour, price_of: F) -> f64
    where
        F: Fn(&str) -> f64,
    {
        let equity: f64 = self
            .positions
            .values()
            .map(|p| p.market_value(price_of(&p.ticker)))
            .sum();
        let options: f64 = self
            .options
            .values()
            .flatten()
            .filter(|o| !o.is_expired(hour))
            .map(|o| o.market_value(price_of(&o.ticker)))
            .sum();
        self.cash + equity + options
    }

    fn record(&mut self, trade: TradeRecord) -> TradeRecord {
        self.trades.push(trade.clone());
        trade
    }
}

//! Simulation Clock / Orchestrator
//!
//! Owns the whole run state and is the only thing that mutates it. Time moves
//! only when [`Simulation::advance_hour`] is called; each call runs the fixed
//! per-hour sequence:
//!
//! 1. increment the hour and classify it (mid-day, end of day)
//! 2. activate events at trigger points
//! 3. move every price
//! 4. retire active events at random
//! 5. drop expired options
//! 6. build the news feed
//! 7. record portfolio value
//!
//! Trade commands validate against the current price and leave state untouched
//! on failure. Callers read state through borrows or cloned snapshots.

use crate::analysis::{self, PerformanceSummary, RunHistory};
use crate::calendar::{Calendar, Hour};
use crate::catalog::Catalog;
use crate::config::{Difficulty, SimulationConfig};
use crate::error::TradeError;
use crate::events::{ActiveEvent, EventHistory, MarketEvent, Sentiment};
use crate::ledger::{Ledger, OptionPosition, TradeRecord};
use crate::news::{self, HeadlineWriter, NewsItem, TemplateHeadlines};
use crate::prices::{PriceEngine, PriceSeries};
use crate::pricing::OptionType;
use crate::selector::EventSelector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Mixed into the run seed for the news stream
const NEWS_STREAM_SALT: u64 = 0x6e65_7773_6665_6564;

/// Hourly chance that an active event of the given sentiment retires.
///
/// Negative events linger longer than positive ones.
pub fn retirement_probability(sentiment: Sentiment) -> f64 {
    match sentiment {
        Sentiment::Negative => 0.2,
        Sentiment::Positive => 0.4,
        Sentiment::Neutral | Sentiment::Mixed => 0.3,
    }
}

/// A player instruction, as submitted by a script or an API client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    Buy {
        ticker: String,
        shares: u64,
    },
    Sell {
        ticker: String,
        shares: u64,
    },
    OpenOption {
        ticker: String,
        option_type: OptionType,
        contracts: u32,
        strike: f64,
        expires_in: Hour,
    },
    CloseOption {
        ticker: String,
        index: usize,
    },
    Watch {
        ticker: String,
    },
}

/// Result of a successful [`Command`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    Trade(TradeRecord),
    Watchlist { ticker: String, watching: bool },
}

/// Price movement of one instrument over one hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub old: f64,
    pub new: f64,
    pub change: f64,
}

/// What happened during one `advance_hour` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourReport {
    pub hour: Hour,
    pub new_events: Vec<ActiveEvent>,
    pub retired_events: Vec<ActiveEvent>,
    pub price_changes: BTreeMap<String, PriceChange>,
    pub expired_options: Vec<OptionPosition>,
    pub is_mid_day: bool,
    pub is_end_of_day: bool,
    pub news: Vec<NewsItem>,
}

impl HourReport {
    fn empty(hour: Hour) -> Self {
        Self {
            hour,
            new_events: Vec::new(),
            retired_events: Vec::new(),
            price_changes: BTreeMap::new(),
            expired_options: Vec::new(),
            is_mid_day: false,
            is_end_of_day: false,
            news: Vec::new(),
        }
    }

    /// Nothing moved: the run was already complete
    pub fn is_empty(&self) -> bool {
        self.price_changes.is_empty() && self.new_events.is_empty() && self.news.is_empty()
    }
}

/// Complete state of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationState {
    pub current_hour: Hour,
    pub total_hours: Hour,
    pub difficulty: Difficulty,
    pub starting_balance: f64,
    pub ledger: Ledger,
    pub prices: BTreeMap<String, PriceSeries>,
    pub active_events: Vec<ActiveEvent>,
    pub completed_events: Vec<ActiveEvent>,
    /// Opening value followed by one entry per elapsed hour
    pub portfolio_history: Vec<f64>,
    pub event_history: EventHistory,
    pub news: Vec<NewsItem>,
}

impl SimulationState {
    pub fn cash(&self) -> f64 {
        self.ledger.cash()
    }

    pub fn price(&self, ticker: &str) -> Option<f64> {
        self.prices.get(ticker).map(PriceSeries::last)
    }

    /// Cash plus marked-to-market holdings at the current hour
    pub fn portfolio_value(&self) -> f64 {
        self.ledger
            .portfolio_value(self.current_hour, |t| self.price(t).unwrap_or(0.0))
    }
}

/// The simulation engine
pub struct Simulation {
    catalog: Arc<Catalog>,
    calendar: Calendar,
    selector: EventSelector,
    engine: PriceEngine,
    market_rng: StdRng,
    news_rng: StdRng,
    writer: Box<dyn HeadlineWriter>,
    state: SimulationState,
}

impl Simulation {
    /// Create a new run at hour 0
    ///
    /// # Arguments
    /// * `catalog` - Shared reference data
    /// * `total_hours` - Run length, expected to be a multiple of 8
    /// * `starting_cash` - Opening cash balance
    /// * `difficulty` - Event mix and volatility setting
    /// * `seed` - Random seed for reproducibility
    pub fn new(
        catalog: Arc<Catalog>,
        total_hours: Hour,
        starting_cash: f64,
        difficulty: Difficulty,
        seed: u64,
    ) -> Self {
        let prices = catalog
            .instruments()
            .iter()
            .map(|i| (i.ticker.clone(), PriceSeries::new(i.base_price)))
            .collect();

        let state = SimulationState {
            current_hour: 0,
            total_hours,
            difficulty,
            starting_balance: starting_cash,
            ledger: Ledger::new(starting_cash),
            prices,
            active_events: Vec::new(),
            completed_events: Vec::new(),
            portfolio_history: vec![starting_cash],
            event_history: EventHistory::new(),
            news: Vec::new(),
        };

        debug!(total_hours, starting_cash, %difficulty, seed, "simulation created");

        Self {
            catalog,
            calendar: Calendar::new(total_hours),
            selector: EventSelector::new(difficulty),
            engine: PriceEngine::new(difficulty),
            market_rng: StdRng::seed_from_u64(seed),
            news_rng: StdRng::seed_from_u64(seed ^ NEWS_STREAM_SALT),
            writer: Box::new(TemplateHeadlines),
            state,
        }
    }

    /// Create a run from the `simulation` section of a config file
    pub fn from_config(catalog: Arc<Catalog>, config: &SimulationConfig) -> Self {
        Self::new(
            catalog,
            config.total_hours,
            config.starting_cash,
            config.difficulty,
            config.seed,
        )
    }

    /// Replace the headline writer used for the news feed
    pub fn with_headline_writer(mut self, writer: Box<dyn HeadlineWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Owned copy of the full state
    pub fn snapshot(&self) -> SimulationState {
        self.state.clone()
    }

    pub fn current_hour(&self) -> Hour {
        self.state.current_hour
    }

    pub fn is_complete(&self) -> bool {
        self.calendar.is_complete(self.state.current_hour)
    }

    pub fn current_price(&self, ticker: &str) -> Option<f64> {
        self.state.price(ticker)
    }

    pub fn portfolio_value(&self) -> f64 {
        self.state.portfolio_value()
    }

    /// Return on the starting balance, in percent
    pub fn total_return_pct(&self) -> f64 {
        let start = self.state.starting_balance;
        (self.portfolio_value() - start) / start * 100.0
    }

    /// Advance the clock by one hour.
    ///
    /// Once the run is complete this does nothing and returns an empty report.
    pub fn advance_hour(&mut self) -> HourReport {
        if self.is_complete() {
            return HourReport::empty(self.state.current_hour);
        }

        self.state.current_hour += 1;
        let hour = self.state.current_hour;
        let mut report = HourReport::empty(hour);
        report.is_mid_day = self.calendar.is_mid_day(hour);
        report.is_end_of_day = self.calendar.is_end_of_day(hour);

        // Event activation
        if let Some(trigger) = self.calendar.trigger_point(hour) {
            let picked: Vec<MarketEvent> = self
                .selector
                .select(
                    trigger,
                    hour,
                    self.catalog.events(),
                    &self.state.event_history,
                    &mut self.market_rng,
                )
                .into_iter()
                .cloned()
                .collect();

            for event in picked {
                debug!(hour, id = %event.id, sentiment = ?event.sentiment, ?trigger, "event activated");
                let activation = ActiveEvent::new(event, hour);
                self.state.event_history.append(activation.clone());
                self.state.active_events.push(activation.clone());
                report.new_events.push(activation);
            }
        }

        // Prices
        let shock = self.engine.market_shock(&mut self.market_rng);
        if shock != 0.0 {
            debug!(hour, shock, "market-wide shock");
        }
        for instrument in self.catalog.instruments() {
            let series = match self.state.prices.get_mut(&instrument.ticker) {
                Some(series) => series,
                None => continue,
            };
            let affecting: Vec<&ActiveEvent> = self
                .state
                .active_events
                .iter()
                .filter(|a| a.event.affects(&instrument.ticker))
                .collect();
            let old = series.last();
            let new = self.engine.next_price(
                instrument,
                old,
                &affecting,
                hour,
                shock,
                &mut self.market_rng,
            );
            series.push(new);
            report.price_changes.insert(
                instrument.ticker.clone(),
                PriceChange {
                    old,
                    new,
                    change: new - old,
                },
            );
        }

        // Retirement
        let mut still_active = Vec::with_capacity(self.state.active_events.len());
        for active in self.state.active_events.drain(..) {
            if self
                .market_rng
                .gen_bool(retirement_probability(active.event.sentiment))
            {
                debug!(hour, id = %active.event.id, since = active.activated_at, "event retired");
                report.retired_events.push(active);
            } else {
                still_active.push(active);
            }
        }
        self.state.active_events = still_active;
        self.state
            .completed_events
            .extend(report.retired_events.iter().cloned());

        // Option expiry
        report.expired_options = self.state.ledger.expire_options(hour);

        // News
        let new_templates: Vec<&MarketEvent> = report.new_events.iter().map(|a| &a.event).collect();
        report.news = news::generate_feed(
            hour,
            &new_templates,
            self.catalog.instruments(),
            self.writer.as_ref(),
            &mut self.news_rng,
        );
        self.state.news.extend(report.news.iter().cloned());

        // Portfolio value
        let value = self.portfolio_value();
        self.state.portfolio_history.push(value);

        if self.is_complete() {
            info!(
                hours = hour,
                final_value = value,
                return_pct = self.total_return_pct(),
                trades = self.state.ledger.trades().len(),
                events = self.state.event_history.len(),
                "simulation complete"
            );
        }

        report
    }

    /// Buy shares at the current price
    pub fn buy(&mut self, ticker: &str, shares: u64) -> Result<TradeRecord, TradeError> {
        let price = self.require_price(ticker)?;
        self.state
            .ledger
            .buy(ticker, shares, price, self.state.current_hour)
    }

    /// Sell shares at the current price
    pub fn sell(&mut self, ticker: &str, shares: u64) -> Result<TradeRecord, TradeError> {
        let price = self.require_price(ticker)?;
        self.state
            .ledger
            .sell(ticker, shares, price, self.state.current_hour)
    }

    /// Buy calls or puts expiring `expires_in` hours from now
    pub fn open_option(
        &mut self,
        ticker: &str,
        option_type: OptionType,
        contracts: u32,
        strike: f64,
        expires_in: Hour,
    ) -> Result<TradeRecord, TradeError> {
        let spot = self.require_price(ticker)?;
        self.state.ledger.open_option(
            ticker,
            option_type,
            contracts,
            strike,
            expires_in,
            spot,
            self.state.current_hour,
            self.state.total_hours,
        )
    }

    /// Close an open option at intrinsic value
    pub fn close_option(&mut self, ticker: &str, index: usize) -> Result<TradeRecord, TradeError> {
        let spot = self.require_price(ticker)?;
        self.state
            .ledger
            .close_option(ticker, index, spot, self.state.current_hour)
    }

    /// Returns whether the ticker is watched after the toggle
    pub fn toggle_watchlist(&mut self, ticker: &str) -> Result<bool, TradeError> {
        self.require_price(ticker)?;
        Ok(self.state.ledger.toggle_watchlist(ticker))
    }

    /// Dispatch a [`Command`]
    pub fn execute(&mut self, command: &Command) -> Result<CommandOutcome, TradeError> {
        match command {
            Command::Buy { ticker, shares } => self.buy(ticker, *shares).map(CommandOutcome::Trade),
            Command::Sell { ticker, shares } => self.sell(ticker, *shares).map(CommandOutcome::Trade),
            Command::OpenOption {
                ticker,
                option_type,
                contracts,
                strike,
                expires_in,
            } => self
                .open_option(ticker, *option_type, *contracts, *strike, *expires_in)
                .map(CommandOutcome::Trade),
            Command::CloseOption { ticker, index } => {
                self.close_option(ticker, *index).map(CommandOutcome::Trade)
            }
            Command::Watch { ticker } => {
                self.toggle_watchlist(ticker)
                    .map(|watching| CommandOutcome::Watchlist {
                        ticker: ticker.clone(),
                        watching,
                    })
            }
        }
    }

    /// Logs the analyzer reads, borrowed from the current state
    pub fn analysis_input(&self) -> RunHistory<'_> {
        RunHistory {
            trades: self.state.ledger.trades(),
            portfolio_history: &self.state.portfolio_history,
            event_history: &self.state.event_history,
            final_return_pct: self.total_return_pct(),
            catalog_size: self.catalog.instruments().len(),
            trading_days: self.calendar.trading_days(),
            starting_balance: self.state.starting_balance,
        }
    }

    pub fn performance(&self) -> PerformanceSummary {
        analysis::performance_summary(&self.analysis_input())
    }

    fn require_price(&self, ticker: &str) -> Result<f64, TradeError> {
        self.current_price(ticker)
            .ok_or_else(|| TradeError::UnknownInstrument {
                ticker: ticker.to_string(),
            })
    }
}

//! Trading Simulator Core
//!
//! Hour-by-hour market simulation for an educational trading game:
//! - 8-hour trading days with mid-day and end-of-day event triggers
//! - Difficulty-skewed event selection from a read-only catalog
//! - Bounded price walk driven by decaying event impact
//! - Cash, equity and simplified option ledger
//! - Hourly news feed mixing real events with decoys
//! - Post-run behaviour analysis
//!
//! The binaries in `src/main.rs` (scripted CLI) and `src/web_server.rs`
//! (JSON API) are thin shells over [`simulation::Simulation`].

pub mod analysis;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod news;
pub mod prices;
pub mod pricing;
pub mod selector;
pub mod simulation;

pub use analysis::{analyze, PerformanceSummary, TradingAnalysis};
pub use catalog::{Catalog, Instrument};
pub use config::{Config, Difficulty};
pub use error::{CatalogError, TradeError, TradeErrorKind};
pub use simulation::{Command, CommandOutcome, HourReport, Simulation, SimulationState};

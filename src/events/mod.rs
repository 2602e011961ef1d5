//! Market Event Types
//!
//! Templates come from the catalog and never change. Once the selector
//! activates one it becomes an [`ActiveEvent`], and the activation is recorded
//! in the append-only [`EventHistory`]. The history is the only record of when
//! an event started, which is what decay is computed from.

use crate::calendar::{self, Day, Hour};
use serde::{Deserialize, Serialize};

/// Direction an event pushes prices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

/// Coarse magnitude class of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
    Extreme,
}

impl Impact {
    /// Base per-hour price move for an event of this tier.
    pub fn base_volatility(self) -> f64 {
        match self {
            Impact::Low => 0.01,
            Impact::Medium => 0.015,
            Impact::High => 0.02,
            Impact::Extreme => 0.03,
        }
    }
}

/// How long the catalog author expected the story to last.
///
/// Informational only: actual lifetime is decided by per-hour retirement draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    Immediate,
    Short,
    Medium,
    Long,
}

/// Story category of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Earnings,
    Regulatory,
    Partnership,
    Product,
    Macro,
    Rumor,
    Sector,
    Crisis,
    Merger,
    Analyst,
    Technical,
    Pandemic,
    Political,
    Social,
    Environmental,
    Geopolitical,
    Other,
}

/// A catalog event template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default = "default_kind")]
    pub kind: EventKind,
    pub sentiment: Sentiment,
    pub impact: Impact,
    pub duration: DurationClass,
    /// Tickers moved by this event. Empty means market-wide.
    #[serde(default)]
    pub affected: Vec<String>,
}

impl MarketEvent {
    pub fn is_market_wide(&self) -> bool {
        self.affected.is_empty()
    }

    /// Whether this event moves the given instrument.
    pub fn affects(&self, ticker: &str) -> bool {
        self.is_market_wide() || self.affected.iter().any(|t| t == ticker)
    }
}

fn default_kind() -> EventKind {
    EventKind::Other
}

/// A template that is currently influencing prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEvent {
    pub event: MarketEvent,
    pub activated_at: Hour,
}

impl ActiveEvent {
    pub fn new(event: MarketEvent, activated_at: Hour) -> Self {
        Self {
            event,
            activated_at,
        }
    }

    /// Hours the event has been live, counting the activation hour as 1.
    pub fn hours_active(&self, hour: Hour) -> u32 {
        hour.saturating_sub(self.activated_at) + 1
    }

    /// Display projection with the sentiment stripped.
    pub fn public_view(&self) -> PublicEvent {
        PublicEvent {
            id: self.event.id.clone(),
            title: self.event.title.clone(),
            description: self.event.description.clone(),
            kind: self.event.kind,
            affected: self.event.affected.clone(),
            activated_at: self.activated_at,
        }
    }
}

/// What a player is allowed to see about an activated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicEvent {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: EventKind,
    pub affected: Vec<String>,
    pub activated_at: Hour,
}

/// Append-only log of every activation in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventHistory {
    entries: Vec<ActiveEvent>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an activation
    pub fn append(&mut self, entry: ActiveEvent) {
        self.entries.push(entry);
    }

    /// All activations in the order they fired
    pub fn all(&self) -> &[ActiveEvent] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hour at which a template was activated, if it ever was.
    pub fn activation_hour(&self, event_id: &str) -> Option<Hour> {
        self.entries
            .iter()
            .find(|e| e.event.id == event_id)
            .map(|e| e.activated_at)
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.activation_hour(event_id).is_some()
    }

    /// Number of activations that fired during the given trading day.
    pub fn activations_on_day(&self, day: Day) -> usize {
        self.entries
            .iter()
            .filter(|e| e.activated_at > 0 && calendar::day_of(e.activated_at) == day)
            .count()
    }

    /// Activations with the given sentiment
    pub fn count_with(&self, sentiment: Sentiment) -> usize {
        self.entries
            .iter()
            .filter(|e| e.event.sentiment == sentiment)
            .count()
    }

    /// Activations of events that list `ticker` by name within the hours
    /// `[from, to)`. Market-wide events are not included.
    pub fn naming_between<'a>(
        &'a self,
        ticker: &'a str,
        from: Hour,
        to: Hour,
    ) -> impl Iterator<Item = &'a ActiveEvent> + 'a {
        self.entries.iter().filter(move |e| {
            e.activated_at >= from && e.activated_at < to && e.event.affected.iter().any(|t| t == ticker)
        })
    }
}

//! Hourly News Feed
//!
//! Every hour the player sees a fixed-size feed: one item per newly activated
//! event plus filler items that move nothing. Real items are always shown with
//! a neutral tone so the feed never leaks sentiment, and every item gets an
//! id of the same `news-<hour>-<n>` form once the feed is shuffled.
//!
//! Feed generation draws from its own RNG stream and is never read back by the
//! price engine.

use crate::calendar::Hour;
use crate::catalog::{Instrument, Sector};
use crate::events::MarketEvent;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Items shown per hour, real and decoy combined
pub const NEWS_ITEMS_PER_HOUR: usize = 10;

const SOURCES: [&str; 12] = [
    "Bloomberg",
    "Reuters",
    "Wall Street Journal",
    "Financial Times",
    "CNBC",
    "MarketWatch",
    "TechCrunch",
    "Business Wire",
    "PR Newswire",
    "Yahoo Finance",
    "Seeking Alpha",
    "The Street",
];

const DECOY_NEUTRAL_PROBABILITY: f64 = 0.4;
const DECOY_NAMES_TICKER_PROBABILITY: f64 = 0.6;

/// Tone shown next to a headline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsTone {
    Positive,
    Negative,
    Neutral,
}

/// One entry in the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub headline: String,
    pub source: String,
    pub hour: Hour,
    pub tickers: Vec<String>,
    pub tone: NewsTone,
    /// Template behind the item when it reports a live event. Never sent to
    /// players.
    #[serde(skip)]
    pub event_id: Option<String>,
}

impl NewsItem {
    /// Backed by an event that moves prices
    pub fn is_real(&self) -> bool {
        self.event_id.is_some()
    }
}

/// Produces headline and article text for the feed.
///
/// Implementations may be slow or unavailable; the simulation never depends on
/// what they return.
pub trait HeadlineWriter: Send + Sync {
    fn real_headline(&self, event: &MarketEvent) -> String {
        event.title.clone()
    }

    /// Filler headline about `instrument`. `pick` is a random index the
    /// writer may reduce modulo its template count.
    fn decoy_headline(&self, instrument: &Instrument, pick: usize) -> String;

    /// Longer body text for a headline
    fn article(&self, headline: &str, instrument: Option<&Instrument>) -> String;
}

/// Offline writer built from fixed per-sector templates
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateHeadlines;

impl TemplateHeadlines {
    fn templates(sector: Sector, ticker: &str, name: &str) -> Vec<String> {
        match sector {
            Sector::Technology | Sector::Other => vec![
                format!("{} Announces Minor Product Update", name),
                format!("{} Stock Sees Normal Trading Volume", ticker),
                format!("Analyst Maintains Neutral Rating on {}", ticker),
                format!("{} CEO Attends Industry Conference", name),
                format!("Routine Quarterly Report Filed by {}", ticker),
                format!("{} Expands Office Space in Secondary Market", name),
                format!("Standard Market Activity for {} Today", ticker),
                format!("{} Announces Board Meeting Scheduled", name),
            ],
            Sector::Healthcare => vec![
                format!("{} Files Routine Regulatory Documentation", name),
                format!("{} Maintains Standard Operations", ticker),
                format!("Normal Trading Patterns for {} Stock", name),
                format!("{} Announces Standard Quarterly Meeting", name),
                format!("No Significant Changes Reported for {}", ticker),
                format!("{} Continues Standard Business Operations", name),
            ],
            Sector::Energy => vec![
                format!("{} Reports Standard Operational Metrics", name),
                format!("Normal Market Activity for {} Today", ticker),
                format!("{} Maintains Regular Production Levels", name),
                format!("Routine Market Update from {}", ticker),
                format!("{} Continues Standard Operations", name),
            ],
            Sector::Financial => vec![
                format!("{} Files Standard Regulatory Report", name),
                format!("Normal Trading Volume for {}", ticker),
                format!("{} Announces Routine Board Meeting", name),
                format!("Standard Market Activity for {}", ticker),
                format!("{} Maintains Normal Operations", name),
            ],
            Sector::Consumer => vec![
                format!("{} Reports Standard Sales Metrics", name),
                format!("Normal Trading Activity for {}", ticker),
                format!("{} Announces Routine Store Operations", name),
                format!("Standard Market Update from {}", ticker),
                format!("{} Continues Regular Business Activities", name),
            ],
            Sector::Automotive => vec![
                format!("{} Reports Standard Production Numbers", name),
                format!("Normal Market Activity for {}", ticker),
                format!("{} Maintains Regular Operations", name),
                format!("Routine Update from {}", ticker),
                format!("{} Continues Standard Manufacturing", name),
            ],
            Sector::Education => vec![
                format!("{} Reports Standard Enrollment Metrics", name),
                format!("Normal Trading for {} Today", ticker),
                format!("{} Announces Routine Academic Calendar", name),
                format!("Standard Operations Update from {}", ticker),
                format!("{} Maintains Regular Educational Services", name),
            ],
        }
    }
}

impl HeadlineWriter for TemplateHeadlines {
    fn decoy_headline(&self, instrument: &Instrument, pick: usize) -> String {
        let templates = Self::templates(instrument.sector, &instrument.ticker, &instrument.name);
        templates[pick % templates.len()].clone()
    }

    fn article(&self, headline: &str, _instrument: Option<&Instrument>) -> String {
        format!("{}. Market participants are watching closely.", headline)
    }
}

/// Build the feed for `hour`.
///
/// Produces one item per event in `new_events` and tops up with decoys to
/// [`NEWS_ITEMS_PER_HOUR`]. If more events fired than fit, all of them are
/// still shown and no decoys are added.
pub fn generate_feed<R: Rng>(
    hour: Hour,
    new_events: &[&MarketEvent],
    instruments: &[Instrument],
    writer: &dyn HeadlineWriter,
    rng: &mut R,
) -> Vec<NewsItem> {
    let mut feed = Vec::with_capacity(NEWS_ITEMS_PER_HOUR.max(new_events.len()));

    for event in new_events {
        feed.push(NewsItem {
            id: String::new(),
            headline: writer.real_headline(event),
            source: pick_source(rng),
            hour,
            tickers: event.affected.clone(),
            tone: NewsTone::Neutral,
            event_id: Some(event.id.clone()),
        });
    }

    let decoys = NEWS_ITEMS_PER_HOUR.saturating_sub(new_events.len());
    for _ in 0..decoys {
        let instrument = match instruments.choose(rng) {
            Some(instrument) => instrument,
            None => break,
        };
        let headline = writer.decoy_headline(instrument, rng.gen());
        let source = pick_source(rng);
        let tone = if rng.gen_bool(DECOY_NEUTRAL_PROBABILITY) {
            NewsTone::Neutral
        } else if rng.gen_bool(0.5) {
            NewsTone::Positive
        } else {
            NewsTone::Negative
        };
        let tickers = if rng.gen_bool(DECOY_NAMES_TICKER_PROBABILITY) {
            vec![instrument.ticker.clone()]
        } else {
            Vec::new()
        };

        feed.push(NewsItem {
            id: String::new(),
            headline,
            source,
            hour,
            tickers,
            tone,
            event_id: None,
        });
    }

    feed.shuffle(rng);
    for (n, item) in feed.iter_mut().enumerate() {
        item.id = format!("news-{}-{}", hour, n);
    }
    feed
}

fn pick_source<R: Rng>(rng: &mut R) -> String {
    SOURCES[rng.gen_range(0..SOURCES.len())].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::events::tests::template;
    use crate::events::Sentiment;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_feed_is_topped_up_to_fixed_size() {
        let catalog = Catalog::builtin().unwrap();
        let events = [
            template("e1", Sentiment::Negative, &["GLCR"]),
            template("e2", Sentiment::Positive, &[]),
        ];
        let refs: Vec<&MarketEvent> = events.iter().collect();
        let mut rng = StdRng::seed_from_u64(1);

        let feed = generate_feed(4, &refs, catalog.instruments(), &TemplateHeadlines, &mut rng);
        assert_eq!(feed.len(), NEWS_ITEMS_PER_HOUR);
        assert_eq!(feed.iter().filter(|n| n.is_real()).count(), 2);
        assert!(feed.iter().all(|n| n.hour == 4));

        let real = feed
            .iter()
            .find(|n| n.event_id.as_deref() == Some("e1"))
            .unwrap();
        assert_eq!(real.tone, NewsTone::Neutral);
        assert_eq!(real.tickers, vec!["GLCR".to_string()]);
        assert_eq!(real.headline, "Event e1");
    }

    #[test]
    fn test_quiet_hour_is_all_decoys() {
        let catalog = Catalog::builtin().unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        let feed = generate_feed(3, &[], catalog.instruments(), &TemplateHeadlines, &mut rng);

        assert_eq!(feed.len(), NEWS_ITEMS_PER_HOUR);
        assert!(feed.iter().all(|n| !n.is_real() && n.id.starts_with("news-3-")));
        assert!(feed.iter().all(|n| SOURCES.contains(&n.source.as_str())));
        assert!(feed.iter().all(|n| n.tickers.len() <= 1));
    }

    #[test]
    fn test_event_link_is_not_serialized() {
        let item = NewsItem {
            id: "news-8-0".to_string(),
            headline: "Something happened".to_string(),
            source: "Reuters".to_string(),
            hour: 8,
            tickers: vec![],
            tone: NewsTone::Neutral,
            event_id: Some("evt-7".to_string()),
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("event_id"));
        assert!(!json.contains("evt-7"));
        assert!(json.contains("\"tone\":\"neutral\""));

        let back: NewsItem = serde_json::from_str(&json).unwrap();
        assert!(!back.is_real());
    }

    #[test]
    fn test_serialized_ids_do_not_reveal_real_items() {
        let catalog = Catalog::builtin().unwrap();
        let events = [
            template("e1", Sentiment::Negative, &["GLCR"]),
            template("e2", Sentiment::Positive, &[]),
            template("e3", Sentiment::Negative, &["EDU"]),
        ];
        let refs: Vec<&MarketEvent> = events.iter().collect();
        let mut rng = StdRng::seed_from_u64(3);

        let feed = generate_feed(4, &refs, catalog.instruments(), &TemplateHeadlines, &mut rng);
        let json = serde_json::to_value(&feed).unwrap();
        let ids: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap())
            .collect();

        let expected: Vec<String> = (0..NEWS_ITEMS_PER_HOUR).map(|n| format!("news-4-{}", n)).collect();
        assert_eq!(ids, expected);
        for item in json.as_array().unwrap() {
            let keys: Vec<&String> = item.as_object().unwrap().keys().collect();
            assert_eq!(keys.len(), 6, "unexpected fields: {:?}", keys);
        }
    }

    #[test]
    fn test_template_writer() {
        let catalog = Catalog::builtin().unwrap();
        let edu = catalog.instrument("EDU").unwrap();
        let writer = TemplateHeadlines;

        let headline = writer.decoy_headline(edu, 1);
        assert_eq!(headline, "Normal Trading for EDU Today");
        // Index wraps around the template list
        assert_eq!(writer.decoy_headline(edu, 6), headline);
        assert_eq!(
            writer.article("Quiet day", Some(edu)),
            "Quiet day. Market participants are watching closely."
        );
    }
}

//! Price Engine
//!
//! Moves each instrument one hour forward from three inputs: the active events
//! touching it, a bounded random walk, and a market-wide shock drawn once per
//! hour. Layered clamps keep stacked impacts from compounding into runaway or
//! near-zero prices:
//!
//! 1. summed event impact is held to ±6% per hour
//! 2. net hourly change is held to ±8% of the opening price
//! 3. absolute price stays within [max(0.01, 0.2·base), 3·base]

use crate::catalog::Instrument;
use crate::calendar::Hour;
use crate::config::Difficulty;
use crate::events::{ActiveEvent, Sentiment};
use rand::Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// At most this many events move one instrument in a single hour
pub const MAX_INFLUENTIAL_EVENTS: usize = 2;
/// Cap on the summed event impact per hour
pub const MAX_EVENT_IMPACT: f64 = 0.06;
/// Cap on the net hourly change
pub const MAX_HOURLY_CHANGE: f64 = 0.08;
/// Constant hourly drift of the random walk
pub const DRIFT: f64 = -0.0003;
/// Chance per instrument per hour of an extra sell-off
pub const CRASH_PROBABILITY: f64 = 0.15;
/// Chance per hour of a shock hitting every instrument
pub const MARKET_SHOCK_PROBABILITY: f64 = 0.05;
/// Smallest price any instrument may trade at
pub const MIN_PRICE: f64 = 0.01;
/// Lower band as a multiple of base price
pub const FLOOR_RATIO: f64 = 0.2;
/// Upper band as a multiple of base price
pub const CEILING_RATIO: f64 = 3.0;

const DECAY_PER_HOUR: f64 = 0.15;
const DECAY_FLOOR: f64 = 0.3;
const SHOCK_MIN: f64 = 0.02;
const SHOCK_MAX: f64 = 0.05;

/// Share of an event's impact still felt after `hours_active` hours.
///
/// 100% in the activation hour, falling 15 points per hour to a 30% floor.
pub fn decay_factor(hours_active: u32) -> f64 {
    let elapsed = hours_active.saturating_sub(1) as f64;
    (1.0 - elapsed * DECAY_PER_HOUR).clamp(DECAY_FLOOR, 1.0)
}

/// Absolute price band for an instrument: `(floor, ceiling)`
pub fn price_band(base_price: f64) -> (f64, f64) {
    let floor = (FLOOR_RATIO * base_price).max(MIN_PRICE);
    let ceiling = (CEILING_RATIO * base_price).max(floor);
    (floor, ceiling)
}

/// Hour-by-hour price generator
#[derive(Debug, Clone)]
pub struct PriceEngine {
    difficulty: Difficulty,
    noise: Uniform<f64>,
    shock: Uniform<f64>,
}

impl PriceEngine {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            noise: Uniform::new(-0.5, 0.5),
            shock: Uniform::new_inclusive(SHOCK_MIN, SHOCK_MAX),
        }
    }

    /// Draw this hour's market-wide shock: 0 most hours, otherwise -2%..-5%.
    pub fn market_shock<R: Rng>(&self, rng: &mut R) -> f64 {
        if rng.gen_bool(MARKET_SHOCK_PROBABILITY) {
            -rng.sample(self.shock)
        } else {
            0.0
        }
    }

    /// Summed, clamped impact of the events touching one instrument.
    ///
    /// `events` must already be filtered to the instrument and ordered by
    /// activation; only the first [`MAX_INFLUENTIAL_EVENTS`] count.
    pub fn event_impact<R: Rng>(&self, events: &[&ActiveEvent], hour: Hour, rng: &mut R) -> f64 {
        let total: f64 = events
            .iter()
            .take(MAX_INFLUENTIAL_EVENTS)
            .map(|active| {
                let sign = match active.event.sentiment {
                    Sentiment::Positive => 1.0,
                    Sentiment::Negative => -1.0,
                    Sentiment::Neutral => 0.0,
                    Sentiment::Mixed => {
                        if rng.gen_bool(0.5) {
                            1.0
                        } else {
                            -1.0
                        }
                    }
                };
                active.event.impact.base_volatility()
                    * sign
                    * self.difficulty.impact_multiplier()
                    * decay_factor(active.hours_active(hour))
            })
            .sum();
        total.clamp(-MAX_EVENT_IMPACT, MAX_EVENT_IMPACT)
    }

    /// Price of `instrument` at the end of `hour`.
    ///
    /// # Arguments
    /// * `current_price` - Price at the start of the hour
    /// * `affecting` - Active events touching the instrument, in activation order
    /// * `market_shock` - This hour's value from [`PriceEngine::market_shock`]
    pub fn next_price<R: Rng>(
        &self,
        instrument: &Instrument,
        current_price: f64,
        affecting: &[&ActiveEvent],
        hour: Hour,
        market_shock: f64,
        rng: &mut R,
    ) -> f64 {
        let start = current_price;
        let mut price = start * (1.0 + market_shock);

        price *= 1.0 + self.event_impact(affecting, hour, rng);

        let noise = rng.sample(self.noise) * self.difficulty.noise_volatility();
        let crash = if rng.gen_bool(CRASH_PROBABILITY) {
            -rng.sample(self.shock)
        } else {
            0.0
        };
        price *= 1.0 + noise + DRIFT + crash;

        let change = ((price - start) / start).clamp(-MAX_HOURLY_CHANGE, MAX_HOURLY_CHANGE);
        let price = start * (1.0 + change);

        let (floor, ceiling) = price_band(instrument.base_price);
        price.clamp(floor, ceiling)
    }
}

/// Append-only hourly prices for one instrument. Index 0 is the opening price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries(Vec<f64>);

impl PriceSeries {
    pub fn new(initial_price: f64) -> Self {
        Self(vec![initial_price])
    }

    pub fn push(&mut self, price: f64) {
        self.0.push(price);
    }

    /// Latest price
    pub fn last(&self) -> f64 {
        // Never empty: constructed with the opening price and only appended to.
        self.0[self.0.len() - 1]
    }

    pub fn initial(&self) -> f64 {
        self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Sector;
    use crate::events::tests::template;
    use crate::events::Impact;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn instrument(base_price: f64) -> Instrument {
        Instrument {
            ticker: "TEST".to_string(),
            name: "Test Corp".to_string(),
            sector: Sector::Technology,
            base_price,
            volatility: 0.02,
        }
    }

    fn active(id: &str, sentiment: Sentiment, impact: Impact, at: Hour) -> ActiveEvent {
        let mut event = template(id, sentiment, &[]);
        event.impact = impact;
        ActiveEvent::new(event, at)
    }

    #[test]
    fn test_decay_schedule() {
        assert_eq!(decay_factor(1), 1.0);
        assert!((decay_factor(2) - 0.85).abs() < 1e-12);
        assert!((decay_factor(5) - 0.4).abs() < 1e-12);
        assert_eq!(decay_factor(6), 0.3);
        assert_eq!(decay_factor(50), 0.3);
        assert_eq!(decay_factor(0), 1.0);
    }

    #[test]
    fn test_price_band() {
        assert_eq!(price_band(100.0), (20.0, 300.0));
        let (floor, ceiling) = price_band(0.02);
        assert_eq!(floor, MIN_PRICE);
        assert!(ceiling >= floor);
    }

    #[test]
    fn test_event_impact_uses_first_two_only() {
        let engine = PriceEngine::new(Difficulty::Medium);
        let mut rng = StdRng::seed_from_u64(1);
        let a = active("1", Sentiment::Positive, Impact::High, 4);
        let b = active("2", Sentiment::Positive, Impact::Low, 4);
        let c = active("3", Sentiment::Negative, Impact::Extreme, 4);

        let impact = engine.event_impact(&[&a, &b, &c], 4, &mut rng);
        assert!((impact - 0.03).abs() < 1e-12, "got {}", impact);
    }

    #[test]
    fn test_event_impact_is_clamped() {
        let engine = PriceEngine::new(Difficulty::Hard);
        let mut rng = StdRng::seed_from_u64(1);
        let a = active("1", Sentiment::Negative, Impact::Extreme, 8);
        let b = active("2", Sentiment::Negative, Impact::Extreme, 8);

        // 2 * 0.03 * 1.2 = 0.072 before the clamp
        let impact = engine.event_impact(&[&a, &b], 8, &mut rng);
        assert_eq!(impact, -MAX_EVENT_IMPACT);
    }

    #[test]
    fn test_event_impact_decays_and_scales() {
        let engine = PriceEngine::new(Difficulty::Easy);
        let mut rng = StdRng::seed_from_u64(1);
        let a = active("1", Sentiment::Negative, Impact::Medium, 4);

        // Fourth hour live: 0.015 * 0.7 * 0.55
        let impact = engine.event_impact(&[&a], 7, &mut rng);
        assert!((impact + 0.015 * 0.7 * 0.55).abs() < 1e-12);

        let neutral = active("2", Sentiment::Neutral, Impact::Extreme, 4);
        assert_eq!(engine.event_impact(&[&neutral], 4, &mut rng), 0.0);
    }

    #[test]
    fn test_mixed_sentiment_moves_either_way() {
        let engine = PriceEngine::new(Difficulty::Medium);
        let mut rng = StdRng::seed_from_u64(9);
        let mixed = active("1", Sentiment::Mixed, Impact::High, 4);

        let draws: Vec<f64> = (0..64)
            .map(|_| engine.event_impact(&[&mixed], 4, &mut rng))
            .collect();
        assert!(draws.iter().all(|d| (d.abs() - 0.02).abs() < 1e-12));
        assert!(draws.iter().any(|d| *d > 0.0));
        assert!(draws.iter().any(|d| *d < 0.0));
    }

    #[test]
    fn test_reproducibility() {
        let engine = PriceEngine::new(Difficulty::Medium);
        let stock = instrument(100.0);
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);

        let mut p1 = 100.0;
        let mut p2 = 100.0;
        for hour in 1..=40 {
            p1 = engine.next_price(&stock, p1, &[], hour, 0.0, &mut rng1);
            p2 = engine.next_price(&stock, p2, &[], hour, 0.0, &mut rng2);
        }
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_price_series() {
        let mut series = PriceSeries::new(50.0);
        series.push(51.0);
        assert_eq!(series.len(), 2);
        assert_eq!(series.initial(), 50.0);
        assert_eq!(series.last(), 51.0);
    }

    proptest! {
        #[test]
        fn prop_prices_stay_in_bounds(
            seed in any::<u64>(),
            base in 0.5f64..500.0,
            hard in any::<bool>(),
            negative in any::<bool>(),
        ) {
            let difficulty = if hard { Difficulty::Hard } else { Difficulty::Easy };
            let engine = PriceEngine::new(difficulty);
            let stock = instrument(base);
            let sentiment = if negative { Sentiment::Negative } else { Sentiment::Positive };
            let a = active("1", sentiment, Impact::Extreme, 1);
            let b = active("2", sentiment, Impact::Extreme, 1);
            let mut rng = StdRng::seed_from_u64(seed);
            let (floor, ceiling) = price_band(base);

            let mut price = base;
            for hour in 1..=200 {
                let shock = engine.market_shock(&mut rng);
                let next = engine.next_price(&stock, price, &[&a, &b], hour, shock, &mut rng);
                prop_assert!(next >= floor && next <= ceiling);
                prop_assert!(next >= MIN_PRICE);
                prop_assert!(((next - price) / price).abs() <= MAX_HOURLY_CHANGE + 1e-12);
                price = next;
            }
        }
    }
}

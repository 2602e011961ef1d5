//! Event Selector
//!
//! Decides which dormant templates go live at the two trigger points of each
//! trading day. Draws are steered toward the difficulty's positive/negative
//! ratio over every activation so far this run; once both sentiments sit at
//! their target the draw falls back to a difficulty-weighted coin.
//!
//! The counts come from [`EventHistory`], not the active set. Negative events
//! retire more slowly than positive ones, so balancing the active set would
//! keep pulling in positives and the run's mix would drift off target.

use crate::calendar::{self, Hour, TriggerPoint};
use crate::config::Difficulty;
use crate::events::{EventHistory, MarketEvent, Sentiment};
use rand::Rng;
use std::collections::HashSet;

/// Events activated at mid-day: 1..=3
const MID_DAY_RANGE: (usize, usize) = (1, 3);

/// Target activations per trading day: 3..=5
const DAILY_TARGET_RANGE: (usize, usize) = (3, 5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pool {
    Positive,
    Negative,
}

/// Chooses newly-activated events each trigger hour
#[derive(Debug, Clone, Copy)]
pub struct EventSelector {
    difficulty: Difficulty,
}

impl EventSelector {
    pub fn new(difficulty: Difficulty) -> Self {
        Self { difficulty }
    }

    /// How many events the given trigger point should activate.
    pub fn activation_count<R: Rng>(
        &self,
        trigger: TriggerPoint,
        hour: Hour,
        history: &EventHistory,
        rng: &mut R,
    ) -> usize {
        match trigger {
            TriggerPoint::MidDay => rng.gen_range(MID_DAY_RANGE.0..=MID_DAY_RANGE.1),
            TriggerPoint::EndOfDay => {
                let target = rng.gen_range(DAILY_TARGET_RANGE.0..=DAILY_TARGET_RANGE.1);
                let today = history.activations_on_day(calendar::day_of(hour));
                target.saturating_sub(today)
            }
        }
    }

    /// Pick the templates to activate at `hour`.
    ///
    /// A template that appears anywhere in `history` has been used this run
    /// and is never offered again, whether it is still active or completed.
    /// Only positive and negative templates are candidates.
    pub fn select<'c, R: Rng>(
        &self,
        trigger: TriggerPoint,
        hour: Hour,
        catalog: &'c [MarketEvent],
        history: &EventHistory,
        rng: &mut R,
    ) -> Vec<&'c MarketEvent> {
        let count = self.activation_count(trigger, hour, history, rng);
        if count == 0 {
            return Vec::new();
        }

        let used: HashSet<&str> = history.all().iter().map(|e| e.event.id.as_str()).collect();
        let available = catalog.iter().filter(|e| !used.contains(e.id.as_str()));
        let (mut positive, mut negative): (Vec<&MarketEvent>, Vec<&MarketEvent>) = available
            .filter(|e| matches!(e.sentiment, Sentiment::Positive | Sentiment::Negative))
            .partition(|e| e.sentiment == Sentiment::Positive);

        let mut drawn_positive = history.count_with(Sentiment::Positive);
        let mut drawn_negative = history.count_with(Sentiment::Negative);

        let mut picked = Vec::with_capacity(count);
        for _ in 0..count {
            let pool = match self.choose_pool(
                drawn_positive,
                drawn_negative,
                !positive.is_empty(),
                !negative.is_empty(),
                rng,
            ) {
                Some(pool) => pool,
                None => break,
            };

            let source = match pool {
                Pool::Positive => {
                    drawn_positive += 1;
                    &mut positive
                }
                Pool::Negative => {
                    drawn_negative += 1;
                    &mut negative
                }
            };
            let index = rng.gen_range(0..source.len());
            picked.push(source.swap_remove(index));
        }
        picked
    }

    fn choose_pool<R: Rng>(
        &self,
        drawn_positive: usize,
        drawn_negative: usize,
        has_positive: bool,
        has_negative: bool,
        rng: &mut R,
    ) -> Option<Pool> {
        let total = (drawn_positive + drawn_negative) as f64;
        let target_positive = total * self.difficulty.positive_ratio();
        let target_negative = total * self.difficulty.negative_ratio();

        if has_positive && (drawn_positive as f64) < target_positive {
            return Some(Pool::Positive);
        }
        if has_negative && (drawn_negative as f64) < target_negative {
            return Some(Pool::Negative);
        }

        let wants_positive = rng.gen_bool(self.difficulty.positive_ratio());
        match (wants_positive, has_positive, has_negative) {
            (true, true, _) => Some(Pool::Positive),
            (_, _, true) => Some(Pool::Negative),
            (false, true, false) => Some(Pool::Positive),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::tests::template;
    use crate::events::ActiveEvent;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(positive: usize, negative: usize) -> Vec<MarketEvent> {
        let mut events = Vec::new();
        for i in 0..positive {
            events.push(template(&format!("p{}", i), Sentiment::Positive, &[]));
        }
        for i in 0..negative {
            events.push(template(&format!("n{}", i), Sentiment::Negative, &[]));
        }
        events
    }

    #[test]
    fn test_mid_day_activates_one_to_three() {
        let selector = EventSelector::new(Difficulty::Medium);
        let catalog = pool(20, 20);
        let history = EventHistory::new();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let picked = selector.select(TriggerPoint::MidDay, 4, &catalog, &history, &mut rng);
            assert!((1..=3).contains(&picked.len()));
        }
    }

    #[test]
    fn test_end_of_day_tops_up_to_daily_target() {
        let selector = EventSelector::new(Difficulty::Medium);
        let catalog = pool(20, 20);
        let mut history = EventHistory::new();
        for id in ["x1", "x2", "x3", "x4", "x5"] {
            history.append(ActiveEvent::new(template(id, Sentiment::Neutral, &[]), 4));
        }
        let mut rng = StdRng::seed_from_u64(5);

        // Five already fired today: the 3..=5 target is met
        for _ in 0..50 {
            let picked = selector.select(TriggerPoint::EndOfDay, 8, &catalog, &history, &mut rng);
            assert!(picked.is_empty());
        }

        // A new day starts from zero
        let picked = selector.select(TriggerPoint::EndOfDay, 16, &catalog, &history, &mut rng);
        assert!((3..=5).contains(&picked.len()));
    }

    #[test]
    fn test_never_reselects_used_templates() {
        let selector = EventSelector::new(Difficulty::Hard);
        let catalog = pool(2, 2);
        let mut history = EventHistory::new();
        history.append(ActiveEvent::new(catalog[0].clone(), 4));
        history.append(ActiveEvent::new(catalog[2].clone(), 4));
        let mut rng = StdRng::seed_from_u64(11);

        let picked = selector.select(TriggerPoint::EndOfDay, 16, &catalog, &history, &mut rng);
        let ids: Vec<&str> = picked.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(picked.len(), 2);
        assert!(!ids.contains(&"p0"));
        assert!(!ids.contains(&"n0"));
    }

    #[test]
    fn test_empty_pools_activate_nothing() {
        let selector = EventSelector::new(Difficulty::Easy);
        let mut catalog = pool(0, 0);
        catalog.push(template("m", Sentiment::Mixed, &[]));
        catalog.push(template("z", Sentiment::Neutral, &[]));
        let history = EventHistory::new();
        let mut rng = StdRng::seed_from_u64(2);

        let picked = selector.select(TriggerPoint::MidDay, 4, &catalog, &history, &mut rng);
        assert!(picked.is_empty());
    }

    #[test]
    fn test_falls_back_to_other_pool() {
        let selector = EventSelector::new(Difficulty::Hard);
        let catalog = pool(5, 0);
        let history = EventHistory::new();
        let mut rng = StdRng::seed_from_u64(8);

        let picked = selector.select(TriggerPoint::EndOfDay, 8, &catalog, &history, &mut rng);
        assert!((3..=5).contains(&picked.len()));
        assert!(picked.iter().all(|e| e.sentiment == Sentiment::Positive));
    }

    #[test]
    fn test_first_draw_follows_difficulty_weight() {
        let catalog = pool(50, 50);
        let history = EventHistory::new();

        for (difficulty, expected) in [(Difficulty::Easy, 0.6), (Difficulty::Hard, 0.2)] {
            let selector = EventSelector::new(difficulty);
            let mut rng = StdRng::seed_from_u64(21);
            let trials = 4000;
            let positives = (0..trials)
                .filter(|_| {
                    let picked = selector.select(TriggerPoint::MidDay, 4, &catalog, &history, &mut rng);
                    picked[0].sentiment == Sentiment::Positive
                })
                .count();
            let ratio = positives as f64 / trials as f64;
            assert!((ratio - expected).abs() < 0.04, "{}: ratio {}", difficulty, ratio);
        }
    }

    #[test]
    fn test_activation_mix_converges_to_target() {
        for (difficulty, expected) in [(Difficulty::Easy, 0.6), (Difficulty::Hard, 0.2)] {
            let selector = EventSelector::new(difficulty);
            let catalog = pool(300, 300);
            let mut history = EventHistory::new();
            let mut rng = StdRng::seed_from_u64(99);

            for day in 0..40u32 {
                for hour in [day * 8 + 4, day * 8 + 8] {
                    let trigger = if hour % 8 == 4 {
                        TriggerPoint::MidDay
                    } else {
                        TriggerPoint::EndOfDay
                    };
                    let picked: Vec<MarketEvent> = selector
                        .select(trigger, hour, &catalog, &history, &mut rng)
                        .into_iter()
                        .cloned()
                        .collect();
                    for event in picked {
                        history.append(ActiveEvent::new(event, hour));
                    }
                }
            }

            let positives = history
                .all()
                .iter()
                .filter(|e| e.event.sentiment == Sentiment::Positive)
                .count();
            let ratio = positives as f64 / history.len() as f64;
            assert!(history.len() > 100);
            assert!((ratio - expected).abs() < 0.05, "{}: ratio {}", difficulty, ratio);
        }
    }

    #[test]
    fn test_balances_against_run_history() {
        // Ten positives already fired this run; at Hard every draw should lean
        // negative until the history is back near 20:80.
        let selector = EventSelector::new(Difficulty::Hard);
        let catalog = pool(20, 40);
        let mut history = EventHistory::new();
        for event in catalog.iter().filter(|e| e.sentiment == Sentiment::Positive).take(10) {
            history.append(ActiveEvent::new(event.clone(), 4));
        }
        let mut rng = StdRng::seed_from_u64(17);

        let picked = selector.select(TriggerPoint::EndOfDay, 16, &catalog, &history, &mut rng);
        assert!(!picked.is_empty());
        assert!(picked.iter().all(|e| e.sentiment == Sentiment::Negative));
    }
}

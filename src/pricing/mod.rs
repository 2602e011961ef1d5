//! Option Pricing
//!
//! A deliberately simple premium heuristic for the game, not a pricing model:
//! a time-value term proportional to the share of the run the option covers,
//! plus a bonus for being in the money. Settlement uses intrinsic value only.

use serde::{Deserialize, Serialize};

/// Underlying units represented by one contract
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Time-value weight applied to the spot price
const TIME_VALUE_RATE: f64 = 0.15;

/// Share of the in-the-money amount added to the premium
const ITM_BONUS_RATE: f64 = 0.1;

/// Option type (Put or Call)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// In-the-money amount per unit
    pub fn intrinsic_value(self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }
}

/// Premium per underlying unit
///
/// # Arguments
/// * `spot` - Current price of the underlying
/// * `strike` - Strike price
/// * `expiration_hours` - Hours until expiration
/// * `total_run_hours` - Length of the whole run
pub fn premium(
    option_type: OptionType,
    spot: f64,
    strike: f64,
    expiration_hours: u32,
    total_run_hours: u32,
) -> f64 {
    let time_fraction = if total_run_hours == 0 {
        0.0
    } else {
        expiration_hours as f64 / total_run_hours as f64
    };
    let time_value = spot * TIME_VALUE_RATE * time_fraction;
    time_value + ITM_BONUS_RATE * option_type.intrinsic_value(spot, strike)
}

/// Cash needed to open `contracts` at the given premium
pub fn contract_cost(premium: f64, contracts: u32) -> f64 {
    premium * contracts as f64 * CONTRACT_MULTIPLIER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_the_money_premium() {
        // 8 of 80 hours at $100 spot: 100 * 0.15 * 0.1 = 1.50
        let p = premium(OptionType::Call, 100.0, 100.0, 8, 80);
        assert!((p - 1.5).abs() < 1e-12, "Expected 1.50, got {}", p);
        assert!((contract_cost(p, 1) - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_in_the_money_bonus() {
        // Call $10 in the money adds 0.1 * 10
        let call = premium(OptionType::Call, 110.0, 100.0, 8, 80);
        assert!((call - (110.0 * 0.015 + 1.0)).abs() < 1e-12);

        // The same strike is out of the money for a put: no bonus
        let put = premium(OptionType::Put, 110.0, 100.0, 8, 80);
        assert!((put - 110.0 * 0.015).abs() < 1e-12);

        let itm_put = premium(OptionType::Put, 90.0, 100.0, 8, 80);
        assert!((itm_put - (90.0 * 0.015 + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_intrinsic_value() {
        assert_eq!(OptionType::Call.intrinsic_value(110.0, 100.0), 10.0);
        assert_eq!(OptionType::Call.intrinsic_value(90.0, 100.0), 0.0);
        assert_eq!(OptionType::Put.intrinsic_value(90.0, 100.0), 10.0);
        assert_eq!(OptionType::Put.intrinsic_value(110.0, 100.0), 0.0);
    }
}

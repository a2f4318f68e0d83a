//! Threshold-stepped pricing.
//!
//! Each asset accumulates buy and sell volume independently. When a side's
//! cumulative volume reaches its threshold, the price steps once per whole
//! multiple of the threshold and the remainder carries over. Volume that has
//! already triggered a step never counts again.

use matrix_types::asset::floor_price;
use matrix_types::config::AssetSpec;
use matrix_types::TradeAction;

/// Result of folding a trade's volume into an asset's cumulative counter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceStep {
    pub new_value: f64,
    /// Volume left on the counter after any triggered steps.
    pub residual_volume: u32,
    /// Whole threshold multiples crossed by this trade.
    pub multiplier: u32,
    /// Signed percent actually applied (zero when no step triggered).
    pub percent_applied: f64,
}

/// Fold `quantity` units of traded volume into the side's cumulative
/// counter and step the price for every whole threshold multiple crossed.
/// Buys step the price up, sells step it down by the same percent.
pub fn step_price(
    spec: &AssetSpec,
    current_value: f64,
    cumulative_volume: u32,
    quantity: u32,
    action: TradeAction,
) -> PriceStep {
    let threshold = match action {
        TradeAction::Buy => spec.buy_threshold,
        TradeAction::Sell => spec.sell_threshold,
    };
    let cumulative = cumulative_volume + quantity;
    if cumulative < threshold {
        return PriceStep {
            new_value: current_value,
            residual_volume: cumulative,
            multiplier: 0,
            percent_applied: 0.0,
        };
    }
    let multiplier = cumulative / threshold;
    let percent = match action {
        TradeAction::Buy => spec.price_change_percent * multiplier as f64,
        TradeAction::Sell => -spec.price_change_percent * multiplier as f64,
    };
    let new_value = floor_price(current_value * (1.0 + percent / 100.0));
    PriceStep {
        new_value,
        residual_volume: cumulative % threshold,
        multiplier,
        percent_applied: percent,
    }
}

/// Apply a card's percent to a price, clamped to the floor.
pub fn apply_percent(current_value: f64, percent: f64) -> f64 {
    floor_price(current_value + current_value * percent / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_types::config::asset_spec;
    use matrix_types::AssetKind;

    #[test]
    fn below_threshold_accumulates_without_moving_price() {
        let spec = asset_spec(AssetKind::Crypto);
        let step = step_price(&spec, 200.0, 0, 40, TradeAction::Buy);
        assert_eq!(step.new_value, 200.0);
        assert_eq!(step.residual_volume, 40);
        assert_eq!(step.multiplier, 0);
    }

    #[test]
    fn crossing_threshold_steps_once_and_carries_remainder() {
        let spec = asset_spec(AssetKind::Crypto);
        let step = step_price(&spec, 200.0, 40, 100, TradeAction::Buy);
        assert_eq!(step.multiplier, 1);
        assert_eq!(step.new_value, 250.0);
        assert_eq!(step.residual_volume, 40);
    }

    #[test]
    fn crypto_two_buys_trigger_exactly_one_step() {
        // Buy 40, then buy 100: cumulative 140 crosses the 100 threshold
        // exactly once. The already-counted 40 must not fuel a second step,
        // so the price is 250, not 312.5.
        let spec = asset_spec(AssetKind::Crypto);
        let first = step_price(&spec, 200.0, 0, 40, TradeAction::Buy);
        assert_eq!(first.new_value, 200.0);
        let second = step_price(&spec, first.new_value, first.residual_volume, 100, TradeAction::Buy);
        assert_eq!(second.multiplier, 1);
        assert_eq!(second.new_value, 250.0);
        assert_eq!(second.residual_volume, 40);

        // The residual alone cannot trigger anything further.
        let third = step_price(&spec, second.new_value, second.residual_volume, 30, TradeAction::Buy);
        assert_eq!(third.new_value, 250.0);
        assert_eq!(third.residual_volume, 70);
    }

    #[test]
    fn one_large_buy_compounds_per_whole_multiple_in_a_single_step() {
        // 250 units against a 100 threshold is multiplier 2: one application
        // of 50%, not two applications of 25%.
        let spec = asset_spec(AssetKind::Crypto);
        let step = step_price(&spec, 200.0, 0, 250, TradeAction::Buy);
        assert_eq!(step.multiplier, 2);
        assert_eq!(step.percent_applied, 50.0);
        assert_eq!(step.new_value, 300.0);
        assert_eq!(step.residual_volume, 50);
    }

    #[test]
    fn sells_step_down_against_their_own_counter() {
        let spec = asset_spec(AssetKind::Crypto);
        let step = step_price(&spec, 200.0, 0, 80, TradeAction::Sell);
        assert_eq!(step.multiplier, 1);
        assert_eq!(step.percent_applied, -25.0);
        assert_eq!(step.new_value, 150.0);
        assert_eq!(step.residual_volume, 0);
    }

    #[test]
    fn price_never_falls_below_floor() {
        let spec = asset_spec(AssetKind::Crypto);
        let step = step_price(&spec, 1.2, 0, 320, TradeAction::Sell);
        assert_eq!(step.multiplier, 4);
        assert_eq!(step.new_value, 1.0);

        assert_eq!(apply_percent(1.5, -80.0), 1.0);
        assert_eq!(apply_percent(100.0, -45.0), 55.0);
    }

    #[test]
    fn card_percent_applies_linearly() {
        assert_eq!(apply_percent(200.0, 30.0), 260.0);
        assert_eq!(apply_percent(300.0, -35.0), 195.0);
    }
}

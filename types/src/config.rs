//! Canonical game configuration.
//!
//! All of these values are fixed for a deployment: the five tradable assets
//! with their pricing thresholds, the 40-card population, and the round and
//! team limits. They are compile-time tables rather than runtime config so
//! that the card population and category cardinalities cannot drift apart.

use crate::asset::AssetKind;
use crate::card::SpecialEffect;

/// Starting virtual balance for every registered team.
pub const INITIAL_BALANCE: f64 = 100_000.0;

/// Lowest round a rollback may reach.
pub const MIN_ROUNDS: u32 = 1;

/// Highest round the game may advance to.
pub const MAX_ROUNDS: u32 = 20;

/// Cap on teams admitted to round 2.
pub const MAX_QUALIFIED_TEAMS: usize = 10;

/// The deck is reshuffled whenever the round number is a multiple of this.
pub const SHUFFLE_CADENCE: u32 = 2;

/// No price mutation may take an asset below this value.
pub const MIN_ASSET_VALUE: f64 = 1.0;

/// Market shock cuts the target team's highest-value holding by this percent.
pub const MARKET_SHOCK_PERCENT: f64 = -10.0;

/// Price history per asset is bounded to the most recent entries.
pub const PRICE_HISTORY_LIMIT: usize = 100;

/// Number of cards offered by the preview/select mechanic.
pub const PREVIEW_COUNT: usize = 5;

/// Total fixed card population.
pub const DECK_SIZE: usize = 40;

/// Per-asset trading parameters.
#[derive(Clone, Copy, Debug)]
pub struct AssetSpec {
    pub name: &'static str,
    pub base_value: f64,
    /// Cumulative buy volume that triggers a price step.
    pub buy_threshold: u32,
    /// Cumulative sell volume that triggers a price step.
    pub sell_threshold: u32,
    /// Percent applied per threshold multiple (positive; sells negate it).
    pub price_change_percent: f64,
}

/// Trading parameters for an asset kind.
pub const fn asset_spec(kind: AssetKind) -> AssetSpec {
    match kind {
        AssetKind::Crypto => AssetSpec {
            name: "Crypto Token",
            base_value: 200.0,
            buy_threshold: 100,
            sell_threshold: 80,
            price_change_percent: 25.0,
        },
        AssetKind::Stock => AssetSpec {
            name: "Stock",
            base_value: 250.0,
            buy_threshold: 100,
            sell_threshold: 80,
            price_change_percent: 25.0,
        },
        AssetKind::Gold => AssetSpec {
            name: "Gold Coin",
            base_value: 300.0,
            buy_threshold: 100,
            sell_threshold: 80,
            price_change_percent: 25.0,
        },
        AssetKind::EuroBond => AssetSpec {
            name: "Euro Bond",
            base_value: 350.0,
            buy_threshold: 100,
            sell_threshold: 80,
            price_change_percent: 25.0,
        },
        AssetKind::TreasuryBill => AssetSpec {
            name: "Treasury Bill",
            base_value: 400.0,
            buy_threshold: 100,
            sell_threshold: 80,
            price_change_percent: 25.0,
        },
    }
}

/// One row of the asset-card population table.
#[derive(Clone, Copy, Debug)]
pub struct AssetCardSpec {
    pub asset: AssetKind,
    pub min_percent: f64,
    pub max_percent: f64,
    pub count: usize,
}

/// Category 1: asset increase cards (12 cards).
pub const ASSET_INCREASE_CARDS: [AssetCardSpec; 5] = [
    AssetCardSpec { asset: AssetKind::Crypto, min_percent: 30.0, max_percent: 30.0, count: 3 },
    AssetCardSpec { asset: AssetKind::Stock, min_percent: 35.0, max_percent: 35.0, count: 3 },
    AssetCardSpec { asset: AssetKind::Gold, min_percent: 45.0, max_percent: 45.0, count: 2 },
    AssetCardSpec { asset: AssetKind::EuroBond, min_percent: 40.0, max_percent: 40.0, count: 2 },
    AssetCardSpec { asset: AssetKind::TreasuryBill, min_percent: 45.0, max_percent: 45.0, count: 2 },
];

/// Category 2: asset decrease cards (12 cards). Percentages are negative.
pub const ASSET_DECREASE_CARDS: [AssetCardSpec; 5] = [
    AssetCardSpec { asset: AssetKind::Crypto, min_percent: -45.0, max_percent: -45.0, count: 3 },
    AssetCardSpec { asset: AssetKind::Stock, min_percent: -30.0, max_percent: -30.0, count: 3 },
    AssetCardSpec { asset: AssetKind::Gold, min_percent: -35.0, max_percent: -35.0, count: 2 },
    AssetCardSpec { asset: AssetKind::EuroBond, min_percent: -30.0, max_percent: -30.0, count: 2 },
    AssetCardSpec { asset: AssetKind::TreasuryBill, min_percent: -40.0, max_percent: -40.0, count: 2 },
];

/// One row of the inter-team card population table.
#[derive(Clone, Copy, Debug)]
pub struct InterTeamCardSpec {
    pub effect: SpecialEffect,
    pub description: &'static str,
    pub count: usize,
}

/// Category 3: inter-team impact cards (8 cards).
pub const INTER_TEAM_CARDS: [InterTeamCardSpec; 4] = [
    InterTeamCardSpec {
        effect: SpecialEffect::TradeFreeze,
        description: "Next team may trade only ONE asset during their turn",
        count: 2,
    },
    InterTeamCardSpec {
        effect: SpecialEffect::MarketShock,
        description: "Next team's highest-value asset decreases by 10%",
        count: 2,
    },
    InterTeamCardSpec {
        effect: SpecialEffect::InsiderInformation,
        description: "Current team is exempted from drawing a card in the next round",
        count: 2,
    },
    InterTeamCardSpec {
        effect: SpecialEffect::ReverseImpact,
        description: "The effect of the next team's drawn card is reversed",
        count: 2,
    },
];

/// Category 4: neutral cards (8 cards).
pub const NEUTRAL_CARD_COUNT: usize = 8;
pub const NEUTRAL_CARD_DESCRIPTION: &str =
    "Better Luck Next Time - No impact on assets or trading conditions";

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{asset_spec, MIN_ASSET_VALUE, PRICE_HISTORY_LIMIT};

/// The fixed set of tradable instruments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Crypto,
    Stock,
    Gold,
    EuroBond,
    TreasuryBill,
}

impl AssetKind {
    /// All kinds in canonical order. This order is also the market-shock
    /// tie-break when two holdings have equal value.
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Crypto,
        AssetKind::Stock,
        AssetKind::Gold,
        AssetKind::EuroBond,
        AssetKind::TreasuryBill,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Crypto => "CRYPTO",
            AssetKind::Stock => "STOCK",
            AssetKind::Gold => "GOLD",
            AssetKind::EuroBond => "EURO_BOND",
            AssetKind::TreasuryBill => "TREASURY_BILL",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a price-history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    Initialization,
    Trade,
    CardEffect,
    ManualAdjustment,
    /// Appended to every asset on round advance at the unchanged value, so
    /// every round has an explicit entry even when nothing traded.
    RoundMarker,
    Rollback,
    Reset,
}

/// One entry in an asset's bounded price log.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub value: f64,
    pub round: u32,
    pub event: HistoryEvent,
    pub timestamp_ms: u64,
}

/// A tradable instrument and its pricing state.
///
/// Invariants: `current_value` is always the value of the last entry in
/// `price_history`, and both volume counters stay within `[0, threshold)`
/// after every trade is processed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub kind: AssetKind,
    pub name: String,
    pub base_value: f64,
    pub current_value: f64,
    pub cumulative_buy_volume: u32,
    pub cumulative_sell_volume: u32,
    pub price_history: Vec<PricePoint>,
    pub version: u64,
}

impl Asset {
    /// Create an asset at its configured base value with an initialization
    /// history point.
    pub fn new(kind: AssetKind, timestamp_ms: u64) -> Self {
        let spec = asset_spec(kind);
        Self {
            kind,
            name: spec.name.to_string(),
            base_value: spec.base_value,
            current_value: spec.base_value,
            cumulative_buy_volume: 0,
            cumulative_sell_volume: 0,
            price_history: vec![PricePoint {
                value: spec.base_value,
                round: 0,
                event: HistoryEvent::Initialization,
                timestamp_ms,
            }],
            version: 0,
        }
    }

    /// Set the current value and append the matching history point, keeping
    /// the log bounded. The single write path for the "current value is the
    /// last history entry" invariant.
    pub fn set_price(&mut self, value: f64, round: u32, event: HistoryEvent, timestamp_ms: u64) {
        self.current_value = value;
        self.price_history.push(PricePoint {
            value,
            round,
            event,
            timestamp_ms,
        });
        if self.price_history.len() > PRICE_HISTORY_LIMIT {
            let excess = self.price_history.len() - PRICE_HISTORY_LIMIT;
            self.price_history.drain(..excess);
        }
    }

    /// Reset to the configured base value, wiping volume counters and the
    /// history log.
    pub fn reset(&mut self, timestamp_ms: u64) {
        let spec = asset_spec(self.kind);
        self.base_value = spec.base_value;
        self.current_value = spec.base_value;
        self.cumulative_buy_volume = 0;
        self.cumulative_sell_volume = 0;
        self.price_history = vec![PricePoint {
            value: spec.base_value,
            round: crate::config::MIN_ROUNDS,
            event: HistoryEvent::Reset,
            timestamp_ms,
        }];
    }
}

/// Clamp a candidate price to the configured floor.
pub fn floor_price(value: f64) -> f64 {
    if value < MIN_ASSET_VALUE {
        MIN_ASSET_VALUE
    } else {
        value
    }
}

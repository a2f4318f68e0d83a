use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::asset::AssetKind;
use crate::config::INITIAL_BALANCE;

/// Unique team identifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TeamId(pub Uuid);

impl TeamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A participating team: balance, holdings, and any card effects currently
/// pinned on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub balance: f64,
    /// Units held per asset. Absent key means zero.
    pub holdings: BTreeMap<AssetKind, u32>,
    /// Exempt from drawing a card on its next turn.
    pub has_insider_info: bool,
    /// Restricted to trading a single asset kind this turn.
    pub trade_frozen: bool,
    /// The asset the frozen team committed to, set by its first trade.
    pub frozen_asset: Option<AssetKind>,
    /// Admitted to round 2.
    pub qualified: bool,
    pub version: u64,
}

impl Team {
    pub fn new(name: String) -> Self {
        Self {
            id: TeamId::new(),
            name,
            balance: INITIAL_BALANCE,
            holdings: BTreeMap::new(),
            has_insider_info: false,
            trade_frozen: false,
            frozen_asset: None,
            qualified: false,
            version: 0,
        }
    }

    /// Units held of the given asset (zero if never bought).
    pub fn holding(&self, asset: AssetKind) -> u32 {
        self.holdings.get(&asset).copied().unwrap_or(0)
    }

    pub fn add_holding(&mut self, asset: AssetKind, quantity: u32) {
        *self.holdings.entry(asset).or_insert(0) += quantity;
    }

    /// Remove units, dropping the entry when it reaches zero. Callers must
    /// validate sufficiency first.
    pub fn remove_holding(&mut self, asset: AssetKind, quantity: u32) {
        if let Some(held) = self.holdings.get_mut(&asset) {
            *held = held.saturating_sub(quantity);
            if *held == 0 {
                self.holdings.remove(&asset);
            }
        }
    }

    /// Wipe balance, holdings, and pinned effects back to registration state.
    pub fn reset(&mut self) {
        self.balance = INITIAL_BALANCE;
        self.holdings.clear();
        self.has_insider_info = false;
        self.trade_frozen = false;
        self.frozen_asset = None;
        self.qualified = false;
    }
}

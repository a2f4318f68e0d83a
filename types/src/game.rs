use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::asset::AssetKind;
use crate::card::{CardId, DeckLayout};
use crate::team::TeamId;

/// Lifecycle phase of a game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Registration,
    Round1,
    Round2,
    Completed,
}

/// Card effects that have been drawn but land on a later actor: the next
/// team in turn order (freeze, shock, reverse) rather than the drawer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEffects {
    pub trade_frozen: bool,
    pub market_shock: bool,
    pub reverse_impact: bool,
}

impl PendingEffects {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One row of the computed leaderboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub team: TeamId,
    pub name: String,
    pub balance: f64,
    /// balance + sum(holdings * current prices)
    pub portfolio_value: f64,
    pub rank: usize,
}

/// Rollback checkpoint captured at the start of each round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round: u32,
    pub timestamp_ms: u64,
    pub asset_prices: BTreeMap<AssetKind, f64>,
    pub holdings: BTreeMap<TeamId, BTreeMap<AssetKind, u32>>,
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Cards already drawn when the snapshot was taken. Cards drawn after
    /// this set was captured get un-drawn on rollback.
    pub drawn_cards: BTreeSet<CardId>,
}

/// The single game-level aggregate: rounds, turn order, the deck cursor,
/// snapshots, and cross-team pending effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub current_round: u32,
    pub phase: Phase,
    /// Every team ever registered, in registration order.
    pub registered_teams: Vec<TeamId>,
    /// Teams participating in the current phase, in turn order.
    pub team_order: Vec<TeamId>,
    pub current_team_index: usize,
    pub active_team: Option<TeamId>,
    /// Shuffled deck order; `current_card_index` is the draw cursor into it.
    pub card_deck: Vec<CardId>,
    pub current_card_index: usize,
    pub last_shuffle_round: u32,
    pub deck_layout: Option<DeckLayout>,
    pub drawn_cards: BTreeSet<CardId>,
    /// Checkpoints keyed by round number, ordered for deterministic pruning.
    pub snapshots: BTreeMap<u32, RoundSnapshot>,
    pub pending: PendingEffects,
    /// Monotonic sequence for the trade audit log.
    pub transaction_seq: u64,
    pub version: u64,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            current_round: crate::config::MIN_ROUNDS,
            phase: Phase::Registration,
            registered_teams: Vec::new(),
            team_order: Vec::new(),
            current_team_index: 0,
            active_team: None,
            card_deck: Vec::new(),
            current_card_index: 0,
            last_shuffle_round: 0,
            deck_layout: None,
            drawn_cards: BTreeSet::new(),
            snapshots: BTreeMap::new(),
            pending: PendingEffects::default(),
            transaction_seq: 0,
            version: 0,
        }
    }

    /// Cards still in the deck pool that have not been drawn.
    pub fn cards_remaining(&self) -> usize {
        self.card_deck
            .iter()
            .filter(|id| !self.drawn_cards.contains(id))
            .count()
    }

    /// The team after the active one in turn order, wrapping around.
    pub fn next_team_in_order(&self) -> Option<TeamId> {
        if self.team_order.is_empty() {
            return None;
        }
        let next = (self.current_team_index + 1) % self.team_order.len();
        Some(self.team_order[next])
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Deck summary returned by the state queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckState {
    pub total: usize,
    pub drawn: usize,
    pub remaining: usize,
    pub layout: Option<DeckLayout>,
}

/// A team's balance and marked-to-market holdings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioView {
    pub team: TeamId,
    pub name: String,
    pub balance: f64,
    pub holdings: BTreeMap<AssetKind, u32>,
    pub portfolio_value: f64,
}

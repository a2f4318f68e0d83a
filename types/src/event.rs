use serde::{Deserialize, Serialize};

use crate::asset::{AssetKind, HistoryEvent};
use crate::card::CardId;
use crate::command::{Command, TradeAction};
use crate::game::LeaderboardEntry;
use crate::team::TeamId;

/// Record of one executed trade, persisted to the audit log and echoed in
/// events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub team: TeamId,
    pub round: u32,
    pub asset: AssetKind,
    pub action: TradeAction,
    pub quantity: u32,
    pub price_per_unit: f64,
    pub total: f64,
    /// Set for direct team-to-team transfers.
    pub counterparty: Option<TeamId>,
    pub balance_after: f64,
}

/// Per-item result of a batch trade. Rejected items do not abort the batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TradeOutcome {
    Filled { receipt: TradeReceipt },
    Rejected { asset: AssetKind, quantity: u32, reason: String },
}

/// What applying a card actually did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardEffectOutcome {
    /// An asset card moved a price (possibly after reversal).
    AssetMove {
        asset: AssetKind,
        previous: f64,
        current: f64,
        percent: f64,
        reversed: bool,
    },
    /// Freeze armed against the next team.
    PendingTradeFreeze,
    /// Shock armed against the next team.
    PendingMarketShock,
    /// Drawer exempted from its next draw.
    InsiderGranted { team: TeamId },
    /// Reversal armed against the next drawn asset card.
    PendingReverseImpact,
    /// Neutral card, no effect.
    Nothing,
}

/// Notifications emitted after each successfully applied command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    GameInitialized {
        round: u32,
        assets_created: usize,
    },
    TeamRegistered {
        team: TeamId,
        name: String,
    },
    TeamQualified {
        team: TeamId,
    },
    AssetPriceChanged {
        asset: AssetKind,
        previous: f64,
        current: f64,
        event: HistoryEvent,
        round: u32,
    },
    TradeExecuted {
        receipt: TradeReceipt,
        price_changed: bool,
    },
    BatchTradeExecuted {
        team: TeamId,
        action: TradeAction,
        outcomes: Vec<TradeOutcome>,
        succeeded: usize,
        failed: usize,
    },
    TeamTradeExecuted {
        seller: TradeReceipt,
        buyer: TradeReceipt,
    },
    CardsInitialized {
        count: usize,
    },
    DeckShuffled {
        round: u32,
        remaining: usize,
    },
    CardDrawn {
        team: TeamId,
        card: CardId,
        round: u32,
    },
    /// Insider information spent instead of drawing.
    CardDrawSkipped {
        team: TeamId,
        reason: String,
    },
    CardEffectApplied {
        card: CardId,
        team: TeamId,
        outcome: CardEffectOutcome,
    },
    LeaderboardUpdated {
        entries: Vec<LeaderboardEntry>,
    },
    Round2Started {
        round: u32,
        teams: Vec<TeamId>,
    },
    RoundAdvanced {
        round: u32,
        deck_shuffled: bool,
    },
    RoundRolledBack {
        round: u32,
        cards_restored: usize,
    },
    TeamTurnChanged {
        team: TeamId,
        round: u32,
        trade_frozen: bool,
        market_shock: Option<AssetKind>,
    },
    GameEnded {
        round: u32,
    },
    GameReset {
        assets: usize,
        teams: usize,
        cards: usize,
    },
}

/// Journal entry: the command stream interleaved with the events it caused.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum Output {
    Command(Command),
    Event(Event),
}

//! Shared data model for the market-matrix trading game.
//!
//! Everything here is plain data: the fixed configuration tables, the four
//! persisted aggregates (assets, teams, cards, game state), the admin
//! `Command` surface, and the `Event` notifications the engine emits.
//! The rules themselves live in `matrix-engine`.

pub mod asset;
pub mod card;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod game;
pub mod store;
pub mod team;

pub use asset::{Asset, AssetKind, HistoryEvent, PricePoint};
pub use card::{Card, CardId, CardKind, CardPosition, DeckLayout, PercentRange, SpecialEffect};
pub use command::{Command, TradeAction, TradeItem};
pub use error::EngineError;
pub use event::{CardEffectOutcome, Event, Output, TradeOutcome, TradeReceipt};
pub use game::{
    DeckState, GameState, LeaderboardEntry, PendingEffects, Phase, PortfolioView, RoundSnapshot,
};
pub use store::{Key, Value};
pub use team::{Team, TeamId};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::{Asset, AssetKind};
use crate::card::{Card, CardId};
use crate::event::TradeReceipt;
use crate::game::GameState;
use crate::team::{Team, TeamId};

/// Addressable slots in the state store.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Key {
    /// The single game aggregate.
    Game,
    Asset(AssetKind),
    Team(TeamId),
    Card(CardId),
    /// Append-only trade audit entry, keyed by `GameState::transaction_seq`.
    Transaction(u64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Game => write!(f, "game"),
            Key::Asset(kind) => write!(f, "asset/{kind}"),
            Key::Team(id) => write!(f, "team/{id}"),
            Key::Card(id) => write!(f, "card/{id}"),
            Key::Transaction(seq) => write!(f, "transaction/{seq}"),
        }
    }
}

/// Stored values, one variant per key family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    Game(GameState),
    Asset(Asset),
    Team(Team),
    Card(Card),
    Transaction(TradeReceipt),
}

impl Value {
    /// Optimistic-concurrency version of the aggregate, if it carries one.
    /// Transactions are append-only and unversioned.
    pub fn version(&self) -> Option<u64> {
        match self {
            Value::Game(game) => Some(game.version),
            Value::Asset(asset) => Some(asset.version),
            Value::Team(team) => Some(team.version),
            Value::Card(card) => Some(card.version),
            Value::Transaction(_) => None,
        }
    }

    pub fn set_version(&mut self, version: u64) {
        match self {
            Value::Game(game) => game.version = version,
            Value::Asset(asset) => asset.version = version,
            Value::Team(team) => team.version = version,
            Value::Card(card) => card.version = version,
            Value::Transaction(_) => {}
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::asset::AssetKind;
use crate::card::CardId;
use crate::team::TeamId;

/// Direction of a trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// One leg of a batch trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeItem {
    pub asset: AssetKind,
    pub quantity: u32,
}

/// Every mutation the engine accepts. Commands are applied atomically: a
/// rejected command leaves no partial state behind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Create the five assets and a fresh game aggregate.
    InitializeGame,
    RegisterTeam {
        name: String,
    },
    /// Admit a team to round 2.
    QualifyTeam {
        team: TeamId,
    },
    /// Create the fixed 40-card population.
    InitializeCards,
    ShuffleDeck,
    /// Draw the next card from the deck for a team.
    DrawCard {
        team: TeamId,
    },
    /// Take a specific card from the preview spread.
    DrawSpecificCard {
        team: TeamId,
        card: CardId,
    },
    ApplyCardEffect {
        card: CardId,
        team: TeamId,
        /// Recipient of a "next team" effect; defaults to turn order.
        next_team: Option<TeamId>,
    },
    /// Transition from registration/round 1 into round 2 with the
    /// qualified teams.
    StartRound2,
    NextRound,
    PreviousRound,
    NextTeam,
    Trade {
        team: TeamId,
        asset: AssetKind,
        action: TradeAction,
        quantity: u32,
    },
    BatchTrade {
        team: TeamId,
        action: TradeAction,
        items: Vec<TradeItem>,
    },
    /// Direct asset transfer between two teams at an agreed price.
    TeamTrade {
        from: TeamId,
        to: TeamId,
        asset: AssetKind,
        quantity: u32,
        agreed_price: f64,
    },
    /// Admin override of an asset's current value.
    ManualSetValue {
        asset: AssetKind,
        value: f64,
    },
    EndGame,
    ResetGame,
}

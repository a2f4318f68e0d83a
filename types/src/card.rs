use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::AssetKind;

/// Index into the fixed 40-card population.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CardId(pub u8);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CARD_{}", self.0)
    }
}

/// Inclusive percent bounds for an asset card. When `min == max` the card's
/// effect is fixed; otherwise the engine samples uniformly within the range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PercentRange {
    pub min: f64,
    pub max: f64,
}

impl PercentRange {
    pub const fn fixed(percent: f64) -> Self {
        Self { min: percent, max: percent }
    }
}

/// Effects a team can inflict on another via an inter-team card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecialEffect {
    TradeFreeze,
    MarketShock,
    InsiderInformation,
    ReverseImpact,
}

impl SpecialEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialEffect::TradeFreeze => "TRADE_FREEZE",
            SpecialEffect::MarketShock => "MARKET_SHOCK",
            SpecialEffect::InsiderInformation => "INSIDER_INFORMATION",
            SpecialEffect::ReverseImpact => "REVERSE_IMPACT",
        }
    }
}

impl fmt::Display for SpecialEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four card categories, carrying their category-specific payload.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardKind {
    AssetIncrease { asset: AssetKind, range: PercentRange },
    AssetDecrease { asset: AssetKind, range: PercentRange },
    InterTeam { effect: SpecialEffect },
    Neutral,
}

/// A card in the fixed population. `drawn` flips when a team takes it and
/// only resets on a deck reinitialize or a rollback that returns the card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub kind: CardKind,
    pub description: String,
    pub drawn: bool,
    pub version: u64,
}

impl Card {
    /// The asset this card moves, if it is an asset card.
    pub fn target_asset(&self) -> Option<AssetKind> {
        match self.kind {
            CardKind::AssetIncrease { asset, .. } | CardKind::AssetDecrease { asset, .. } => {
                Some(asset)
            }
            _ => None,
        }
    }

    /// The percent range this card applies, if it is an asset card.
    pub fn range(&self) -> Option<PercentRange> {
        match self.kind {
            CardKind::AssetIncrease { range, .. } | CardKind::AssetDecrease { range, .. } => {
                Some(range)
            }
            _ => None,
        }
    }
}

/// A card's place in the rendered spread.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardPosition {
    pub card: CardId,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub z_index: u32,
}

/// Visual arrangement produced by a shuffle: one position per card, in the
/// shuffled deck order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckLayout {
    pub positions: Vec<CardPosition>,
    pub shuffled_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_card_exposes_target_and_range() {
        let card = Card {
            id: CardId(3),
            kind: CardKind::AssetIncrease {
                asset: AssetKind::Gold,
                range: PercentRange::fixed(45.0),
            },
            description: "Gold Coin increases by 45%".into(),
            drawn: false,
            version: 0,
        };
        assert_eq!(card.target_asset(), Some(AssetKind::Gold));
        assert_eq!(card.range().unwrap().min, 45.0);
    }

    #[test]
    fn neutral_card_has_no_target() {
        let card = Card {
            id: CardId(39),
            kind: CardKind::Neutral,
            description: "Better Luck Next Time".into(),
            drawn: false,
            version: 0,
        };
        assert_eq!(card.target_asset(), None);
        assert_eq!(card.range(), None);
    }

    #[test]
    fn kind_serializes_with_category_tag() {
        let kind = CardKind::InterTeam { effect: SpecialEffect::MarketShock };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["category"], "INTER_TEAM");
        assert_eq!(json["effect"], "MARKET_SHOCK");
    }
}

//! Card population and deck mechanics.
//!
//! The 40-card population is fixed at build time from the configuration
//! tables. Shuffling permutes draw order and produces a fresh visual layout;
//! it never changes which cards exist.

use matrix_types::config::{
    asset_spec, ASSET_DECREASE_CARDS, ASSET_INCREASE_CARDS, DECK_SIZE, INTER_TEAM_CARDS,
    NEUTRAL_CARD_COUNT, NEUTRAL_CARD_DESCRIPTION,
};
use matrix_types::{Card, CardId, CardKind, CardPosition, DeckLayout, PercentRange};
use rand::seq::SliceRandom;
use rand::Rng;

/// Build the full fixed card population in canonical order: increases,
/// decreases, inter-team, then neutral.
pub fn build_population() -> Vec<Card> {
    let mut cards = Vec::with_capacity(DECK_SIZE);
    for row in ASSET_INCREASE_CARDS {
        let name = asset_spec(row.asset).name;
        for _ in 0..row.count {
            cards.push(Card {
                id: CardId(cards.len() as u8),
                kind: CardKind::AssetIncrease {
                    asset: row.asset,
                    range: PercentRange { min: row.min_percent, max: row.max_percent },
                },
                description: format!("{name} increases by {}%", row.max_percent),
                drawn: false,
                version: 0,
            });
        }
    }
    for row in ASSET_DECREASE_CARDS {
        let name = asset_spec(row.asset).name;
        for _ in 0..row.count {
            cards.push(Card {
                id: CardId(cards.len() as u8),
                kind: CardKind::AssetDecrease {
                    asset: row.asset,
                    range: PercentRange { min: row.min_percent, max: row.max_percent },
                },
                description: format!("{name} decreases by {}%", row.max_percent.abs()),
                drawn: false,
                version: 0,
            });
        }
    }
    for row in INTER_TEAM_CARDS {
        for _ in 0..row.count {
            cards.push(Card {
                id: CardId(cards.len() as u8),
                kind: CardKind::InterTeam { effect: row.effect },
                description: row.description.to_string(),
                drawn: false,
                version: 0,
            });
        }
    }
    for _ in 0..NEUTRAL_CARD_COUNT {
        cards.push(Card {
            id: CardId(cards.len() as u8),
            kind: CardKind::Neutral,
            description: NEUTRAL_CARD_DESCRIPTION.to_string(),
            drawn: false,
            version: 0,
        });
    }
    cards
}

/// Fisher-Yates shuffle of a deck order.
pub fn shuffle_order<R: Rng>(order: &mut [CardId], rng: &mut R) {
    order.shuffle(rng);
}

/// Sample up to `count` undrawn cards from the deck pool for a
/// pick-one-of-N preview. Sampling never marks anything drawn; callers
/// commit a choice through a specific draw.
pub fn sample_preview<R: Rng>(
    order: &[CardId],
    drawn: &std::collections::BTreeSet<CardId>,
    count: usize,
    rng: &mut R,
) -> Vec<CardId> {
    let undrawn: Vec<CardId> = order
        .iter()
        .filter(|id| !drawn.contains(id))
        .copied()
        .collect();
    undrawn.choose_multiple(rng, count).copied().collect()
}

/// Produce a scattered table layout for the shuffled order. Positions are
/// percentages of the table surface; z order follows deck order.
pub fn generate_layout<R: Rng>(order: &[CardId], rng: &mut R, now_ms: u64) -> DeckLayout {
    let positions = order
        .iter()
        .enumerate()
        .map(|(index, &card)| CardPosition {
            card,
            x: rng.gen_range(5.0..95.0),
            y: rng.gen_range(5.0..95.0),
            rotation: rng.gen_range(-180.0..180.0),
            z_index: index as u32,
        })
        .collect();
    DeckLayout {
        positions,
        shuffled_at_ms: now_ms,
    }
}

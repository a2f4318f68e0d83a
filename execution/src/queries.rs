//! Read-only views over any [`State`] backend. Everything here is computed
//! on demand from the stored aggregates; nothing is cached.

use matrix_types::config::PREVIEW_COUNT;
use matrix_types::{
    Asset, AssetKind, Card, DeckState, EngineError, GameState, Key, LeaderboardEntry,
    PortfolioView, PricePoint, Team, TeamId, TradeReceipt, Value,
};
use rand::Rng;
use std::collections::BTreeMap;

use crate::state::State;
use crate::{deck, leaderboard};

pub async fn game<S: State>(state: &S) -> Result<GameState, EngineError> {
    match state.get(&Key::Game).await {
        Some(Value::Game(game)) => Ok(game),
        _ => Err(EngineError::GameNotInitialized),
    }
}

pub async fn asset<S: State>(state: &S, kind: AssetKind) -> Result<Asset, EngineError> {
    match state.get(&Key::Asset(kind)).await {
        Some(Value::Asset(asset)) => Ok(asset),
        _ => Err(EngineError::AssetNotFound(kind)),
    }
}

pub async fn assets<S: State>(state: &S) -> Result<Vec<Asset>, EngineError> {
    let mut all = Vec::with_capacity(AssetKind::ALL.len());
    for kind in AssetKind::ALL {
        all.push(asset(state, kind).await?);
    }
    Ok(all)
}

pub async fn price_history<S: State>(
    state: &S,
    kind: AssetKind,
) -> Result<Vec<PricePoint>, EngineError> {
    Ok(asset(state, kind).await?.price_history)
}

pub async fn team<S: State>(state: &S, id: TeamId) -> Result<Team, EngineError> {
    match state.get(&Key::Team(id)).await {
        Some(Value::Team(team)) => Ok(team),
        _ => Err(EngineError::TeamNotFound(id)),
    }
}

async fn price_map<S: State>(state: &S) -> Result<BTreeMap<AssetKind, f64>, EngineError> {
    let mut prices = BTreeMap::new();
    for kind in AssetKind::ALL {
        prices.insert(kind, asset(state, kind).await?.current_value);
    }
    Ok(prices)
}

/// Current standings: a pure function of balances, holdings, and prices.
pub async fn standings<S: State>(state: &S) -> Result<Vec<LeaderboardEntry>, EngineError> {
    let game = game(state).await?;
    let prices = price_map(state).await?;
    let mut teams = Vec::with_capacity(game.registered_teams.len());
    for id in &game.registered_teams {
        teams.push(team(state, *id).await?);
    }
    Ok(leaderboard::compute(&teams, &prices))
}

/// One team's balance and marked-to-market holdings.
pub async fn portfolio<S: State>(state: &S, id: TeamId) -> Result<PortfolioView, EngineError> {
    let team = team(state, id).await?;
    let prices = price_map(state).await?;
    Ok(PortfolioView {
        team: team.id,
        name: team.name.clone(),
        balance: team.balance,
        holdings: team.holdings.clone(),
        portfolio_value: leaderboard::portfolio_value(&team, &prices),
    })
}

/// Deck counters and the current table layout.
pub async fn deck_state<S: State>(state: &S) -> Result<DeckState, EngineError> {
    let game = game(state).await?;
    let remaining = game.cards_remaining();
    Ok(DeckState {
        total: remaining + game.drawn_cards.len(),
        drawn: game.drawn_cards.len(),
        remaining,
        layout: game.deck_layout,
    })
}

/// A fresh pick-one-of-five sample from the undrawn pool. Sampling marks
/// nothing drawn; the selection commits through a specific draw.
pub async fn preview_cards<S: State, R: Rng>(
    state: &S,
    rng: &mut R,
) -> Result<Vec<Card>, EngineError> {
    let game = game(state).await?;
    let picks = deck::sample_preview(&game.card_deck, &game.drawn_cards, PREVIEW_COUNT, rng);
    if picks.len() < PREVIEW_COUNT {
        return Err(EngineError::StateConflict(format!(
            "fewer than {PREVIEW_COUNT} undrawn cards remain"
        )));
    }
    let mut cards = Vec::with_capacity(picks.len());
    for id in picks {
        match state.get(&Key::Card(id)).await {
            Some(Value::Card(card)) => cards.push(card),
            _ => return Err(EngineError::CardNotFound(id)),
        }
    }
    Ok(cards)
}

/// The trade audit log in execution order.
pub async fn transactions<S: State>(state: &S) -> Result<Vec<TradeReceipt>, EngineError> {
    let game = game(state).await?;
    let mut receipts = Vec::with_capacity(game.transaction_seq as usize);
    for seq in 0..game.transaction_seq {
        if let Some(Value::Transaction(receipt)) = state.get(&Key::Transaction(seq)).await {
            receipts.push(receipt);
        }
    }
    Ok(receipts)
}

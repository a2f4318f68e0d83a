//! Leaderboard computation.
//!
//! The leaderboard is never stored: it is a pure function of team balances,
//! holdings, and current asset prices, recomputed whenever any of those
//! change.

use matrix_types::{AssetKind, LeaderboardEntry, Team};
use std::collections::BTreeMap;

/// A team's total value: cash plus holdings marked to current prices.
/// Holdings of unknown assets count nothing.
pub fn portfolio_value(team: &Team, prices: &BTreeMap<AssetKind, f64>) -> f64 {
    let holdings: f64 = team
        .holdings
        .iter()
        .map(|(asset, units)| prices.get(asset).copied().unwrap_or(0.0) * f64::from(*units))
        .sum();
    team.balance + holdings
}

/// Rank teams by portfolio value, highest first. Ties break on team id so
/// the ordering is total and stable across recomputations.
pub fn compute(teams: &[Team], prices: &BTreeMap<AssetKind, f64>) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = teams
        .iter()
        .map(|team| LeaderboardEntry {
            team: team.id,
            name: team.name.clone(),
            balance: team.balance,
            portfolio_value: portfolio_value(team, prices),
            rank: 0,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.portfolio_value
            .partial_cmp(&a.portfolio_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.team.cmp(&b.team))
    });
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }
    entries
}

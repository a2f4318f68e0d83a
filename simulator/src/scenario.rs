//! Scripted game runs.
//!
//! A scenario is a YAML document describing a seed and a sequence of steps.
//! Steps refer to teams by name; the runner resolves names to ids as
//! registrations happen, so scripts stay readable and reorderable.

use anyhow::Context;
use matrix_types::{AssetKind, Command, Event, LeaderboardEntry, TeamId, TradeAction, TradeItem};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::{Role, Simulator};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Scenario {
    pub seed: u64,
    pub steps: Vec<Step>,
}

/// One scripted step. Mirrors the engine's command surface, with team names
/// in place of ids plus a draw-and-apply convenience.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    InitializeGame,
    InitializeCards,
    ShuffleDeck,
    RegisterTeam {
        name: String,
    },
    QualifyTeam {
        team: String,
    },
    Trade {
        team: String,
        asset: AssetKind,
        #[serde(rename = "side")]
        action: TradeAction,
        quantity: u32,
    },
    BatchTrade {
        team: String,
        #[serde(rename = "side")]
        action: TradeAction,
        items: Vec<TradeItem>,
    },
    TeamTrade {
        from: String,
        to: String,
        asset: AssetKind,
        quantity: u32,
        agreed_price: f64,
    },
    DrawCard {
        team: String,
    },
    /// Draw the next card and immediately apply whatever was drawn.
    DrawAndApply {
        team: String,
    },
    StartRound2,
    NextRound,
    PreviousRound,
    NextTeam,
    ManualSetValue {
        asset: AssetKind,
        value: f64,
    },
    EndGame,
    ResetGame,
}

/// Outcome of a completed scenario run.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub steps_applied: usize,
    pub events_emitted: usize,
    pub standings: Vec<LeaderboardEntry>,
}

pub fn load(path: &Path) -> anyhow::Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse scenario {}", path.display()))
}

/// Run every step in order. Scripts run with superadmin rights; any engine
/// rejection aborts the run with context on the failing step.
pub async fn run(simulator: &Simulator, scenario: &Scenario) -> anyhow::Result<Report> {
    let mut teams: HashMap<String, TeamId> = HashMap::new();
    let mut events_emitted = 0;

    for (index, step) in scenario.steps.iter().enumerate() {
        let events = apply_step(simulator, &teams, step)
            .await
            .with_context(|| format!("step {} failed: {:?}", index + 1, step))?;
        for event in &events {
            if let Event::TeamRegistered { team, name } = event {
                teams.insert(name.clone(), *team);
            }
        }
        events_emitted += events.len();
    }

    let standings = simulator.standings().await?;
    info!(
        steps = scenario.steps.len(),
        events = events_emitted,
        "scenario complete"
    );
    Ok(Report {
        steps_applied: scenario.steps.len(),
        events_emitted,
        standings,
    })
}

async fn apply_step(
    simulator: &Simulator,
    teams: &HashMap<String, TeamId>,
    step: &Step,
) -> anyhow::Result<Vec<Event>> {
    let resolve = |name: &str| -> anyhow::Result<TeamId> {
        teams
            .get(name)
            .copied()
            .with_context(|| format!("unknown team: {name}"))
    };

    let command = match step {
        Step::InitializeGame => Command::InitializeGame,
        Step::InitializeCards => Command::InitializeCards,
        Step::ShuffleDeck => Command::ShuffleDeck,
        Step::RegisterTeam { name } => Command::RegisterTeam { name: name.clone() },
        Step::QualifyTeam { team } => Command::QualifyTeam { team: resolve(team)? },
        Step::Trade {
            team,
            asset,
            action,
            quantity,
        } => Command::Trade {
            team: resolve(team)?,
            asset: *asset,
            action: *action,
            quantity: *quantity,
        },
        Step::BatchTrade { team, action, items } => Command::BatchTrade {
            team: resolve(team)?,
            action: *action,
            items: items.clone(),
        },
        Step::TeamTrade {
            from,
            to,
            asset,
            quantity,
            agreed_price,
        } => Command::TeamTrade {
            from: resolve(from)?,
            to: resolve(to)?,
            asset: *asset,
            quantity: *quantity,
            agreed_price: *agreed_price,
        },
        Step::DrawCard { team } => Command::DrawCard { team: resolve(team)? },
        Step::DrawAndApply { team } => {
            let team = resolve(team)?;
            let mut events = simulator
                .submit(Role::Superadmin, Command::DrawCard { team })
                .await?;
            let drawn = events.iter().find_map(|event| match event {
                Event::CardDrawn { card, .. } => Some(*card),
                _ => None,
            });
            if let Some(card) = drawn {
                let applied = simulator
                    .submit(
                        Role::Superadmin,
                        Command::ApplyCardEffect { card, team, next_team: None },
                    )
                    .await?;
                events.extend(applied);
            }
            return Ok(events);
        }
        Step::StartRound2 => Command::StartRound2,
        Step::NextRound => Command::NextRound,
        Step::PreviousRound => Command::PreviousRound,
        Step::NextTeam => Command::NextTeam,
        Step::ManualSetValue { asset, value } => Command::ManualSetValue {
            asset: *asset,
            value: *value,
        },
        Step::EndGame => Command::EndGame,
        Step::ResetGame => Command::ResetGame,
    };
    Ok(simulator.submit(Role::Superadmin, command).await?)
}

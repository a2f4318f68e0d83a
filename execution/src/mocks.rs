//! Test fixtures: a deterministic command runner over [`Memory`] plus
//! helpers that stand up a game in a known state.

use matrix_types::{Command, EngineError, Event, TeamId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::state::Memory;
use crate::Layer;

pub const NOW_MS: u64 = 1_756_500_000_000;

pub fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Apply one command end to end: layer, handler, guarded commit.
pub async fn apply(
    memory: &mut Memory,
    seed: u64,
    now_ms: u64,
    command: Command,
) -> Result<Vec<Event>, EngineError> {
    let mut layer = Layer::new(&*memory, rng(seed), now_ms);
    let events = layer.apply(&command).await?;
    let changes = layer.commit();
    memory.apply_guarded(changes).await?;
    Ok(events)
}

/// Initialize a game with its card deck shuffled under the given seed.
pub async fn setup_game(memory: &mut Memory, seed: u64) {
    apply(memory, seed, NOW_MS, Command::InitializeGame)
        .await
        .expect("initialize game");
    apply(memory, seed, NOW_MS, Command::InitializeCards)
        .await
        .expect("initialize cards");
    apply(memory, seed, NOW_MS, Command::ShuffleDeck)
        .await
        .expect("shuffle deck");
}

/// Register a team and return its generated id.
pub async fn register_team(memory: &mut Memory, seed: u64, name: &str) -> TeamId {
    let events = apply(
        memory,
        seed,
        NOW_MS,
        Command::RegisterTeam { name: name.into() },
    )
    .await
    .expect("register team");
    match events.first() {
        Some(Event::TeamRegistered { team, .. }) => *team,
        other => panic!("expected TeamRegistered, got {other:?}"),
    }
}

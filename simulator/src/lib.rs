//! Local game runner: wraps the engine's in-memory state behind an
//! authorized command API, journals everything that happens, and broadcasts
//! events to any number of subscribers.

pub mod scenario;

use matrix_engine::{queries, Layer, Memory};
use matrix_types::{
    Asset, AssetKind, Card, Command, DeckState, EngineError, Event, GameState, LeaderboardEntry,
    Output, PortfolioView, PricePoint, TeamId, TradeReceipt,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{broadcast, Mutex};

/// Who is issuing a command. Destructive operations need the superadmin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Superadmin,
}

fn requires_superadmin(command: &Command) -> bool {
    matches!(
        command,
        Command::ResetGame | Command::ManualSetValue { .. } | Command::EndGame
    )
}

struct Inner {
    memory: Memory,
    rng: ChaCha8Rng,
    journal: Vec<Output>,
}

/// A running game. Cloning shares the underlying state.
#[derive(Clone)]
pub struct Simulator {
    inner: Arc<Mutex<Inner>>,
    update_tx: broadcast::Sender<Event>,
}

impl Simulator {
    /// All randomness (shuffles, card percent sampling) derives from `seed`,
    /// so a run is reproducible given the same command sequence.
    pub fn new(seed: u64) -> Self {
        let (update_tx, _) = broadcast::channel(1024);
        let inner = Arc::new(Mutex::new(Inner {
            memory: Memory::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            journal: Vec::new(),
        }));
        Self { inner, update_tx }
    }

    /// Apply one command on behalf of `role` at the current wall clock.
    pub async fn submit(&self, role: Role, command: Command) -> Result<Vec<Event>, EngineError> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        self.submit_at(role, command, now_ms).await
    }

    /// Apply one command with an explicit timestamp. Exposed so scripted
    /// runs and tests are fully deterministic.
    pub async fn submit_at(
        &self,
        role: Role,
        command: Command,
        now_ms: u64,
    ) -> Result<Vec<Event>, EngineError> {
        if role != Role::Superadmin && requires_superadmin(&command) {
            return Err(EngineError::Unauthorized(
                "this command requires the superadmin".into(),
            ));
        }

        let mut inner = self.inner.lock().await;
        let seed: u64 = inner.rng.gen();
        let mut layer = Layer::new(&inner.memory, ChaCha8Rng::seed_from_u64(seed), now_ms);
        let events = layer.apply(&command).await?;
        let changes = layer.commit();
        inner.memory.apply_guarded(changes).await?;

        inner.journal.push(Output::Command(command));
        inner
            .journal
            .extend(events.iter().cloned().map(Output::Event));
        drop(inner); // Release lock before broadcasting

        for event in &events {
            if let Err(e) = self.update_tx.send(event.clone()) {
                tracing::debug!("No event subscribers: {}", e);
            }
        }
        Ok(events)
    }

    pub fn subscriber(&self) -> broadcast::Receiver<Event> {
        self.update_tx.subscribe()
    }

    /// Everything applied so far: the command stream interleaved with the
    /// events each command caused.
    pub async fn journal(&self) -> Vec<Output> {
        self.inner.lock().await.journal.clone()
    }

    pub async fn game(&self) -> Result<GameState, EngineError> {
        queries::game(&self.inner.lock().await.memory).await
    }

    pub async fn assets(&self) -> Result<Vec<Asset>, EngineError> {
        queries::assets(&self.inner.lock().await.memory).await
    }

    pub async fn price_history(&self, kind: AssetKind) -> Result<Vec<PricePoint>, EngineError> {
        queries::price_history(&self.inner.lock().await.memory, kind).await
    }

    pub async fn standings(&self) -> Result<Vec<LeaderboardEntry>, EngineError> {
        queries::standings(&self.inner.lock().await.memory).await
    }

    pub async fn portfolio(&self, team: TeamId) -> Result<PortfolioView, EngineError> {
        queries::portfolio(&self.inner.lock().await.memory, team).await
    }

    pub async fn deck_state(&self) -> Result<DeckState, EngineError> {
        queries::deck_state(&self.inner.lock().await.memory).await
    }

    pub async fn preview_cards(&self) -> Result<Vec<Card>, EngineError> {
        let mut inner = self.inner.lock().await;
        let inner = &mut *inner;
        queries::preview_cards(&inner.memory, &mut inner.rng).await
    }

    pub async fn transactions(&self) -> Result<Vec<TradeReceipt>, EngineError> {
        queries::transactions(&self.inner.lock().await.memory).await
    }
}

use matrix_types::{
    Asset, AssetKind, Card, CardId, Command, EngineError, Event, GameState, Key, LeaderboardEntry,
    RoundSnapshot, Team, TeamId, Value,
};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use crate::leaderboard;
use crate::state::{State, Status};

mod handlers;

/// Staged-write overlay over a [`State`] backend.
///
/// One layer handles one command: reads fall through to the backend, writes
/// stage into `pending`. On success the caller commits the staged batch; on
/// failure the layer is dropped and the backend never sees a partial
/// mutation.
pub struct Layer<'a, S: State> {
    state: &'a S,
    pending: BTreeMap<Key, Status>,

    rng: ChaCha8Rng,
    now_ms: u64,
}

impl<'a, S: State> Layer<'a, S> {
    pub fn new(state: &'a S, rng: ChaCha8Rng, now_ms: u64) -> Self {
        Self {
            state,
            pending: BTreeMap::new(),

            rng,
            now_ms,
        }
    }

    /// Apply one command, returning the events it caused. The layer's staged
    /// writes are only meaningful when this returns `Ok`.
    pub async fn apply(&mut self, command: &Command) -> Result<Vec<Event>, EngineError> {
        match command {
            Command::InitializeGame => self.handle_initialize_game().await,
            Command::RegisterTeam { name } => self.handle_register_team(name).await,
            Command::QualifyTeam { team } => self.handle_qualify_team(*team).await,
            Command::InitializeCards => self.handle_initialize_cards().await,
            Command::ShuffleDeck => self.handle_shuffle_deck().await,
            Command::DrawCard { team } => self.handle_draw_card(*team).await,
            Command::DrawSpecificCard { team, card } => {
                self.handle_draw_specific_card(*team, *card).await
            }
            Command::ApplyCardEffect {
                card,
                team,
                next_team,
            } => self.handle_apply_card_effect(*card, *team, *next_team).await,
            Command::StartRound2 => self.handle_start_round2().await,
            Command::NextRound => self.handle_next_round().await,
            Command::PreviousRound => self.handle_previous_round().await,
            Command::NextTeam => self.handle_next_team().await,
            Command::Trade {
                team,
                asset,
                action,
                quantity,
            } => self.handle_trade(*team, *asset, *action, *quantity).await,
            Command::BatchTrade {
                team,
                action,
                items,
            } => self.handle_batch_trade(*team, *action, items).await,
            Command::TeamTrade {
                from,
                to,
                asset,
                quantity,
                agreed_price,
            } => {
                self.handle_team_trade(*from, *to, *asset, *quantity, *agreed_price)
                    .await
            }
            Command::ManualSetValue { asset, value } => {
                self.handle_manual_set_value(*asset, *value).await
            }
            Command::EndGame => self.handle_end_game().await,
            Command::ResetGame => self.handle_reset_game().await,
        }
    }

    pub fn commit(self) -> Vec<(Key, Status)> {
        self.pending.into_iter().collect()
    }

    fn stage(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    fn stage_delete(&mut self, key: Key) {
        self.pending.insert(key, Status::Delete);
    }

    pub(in crate::layer) fn put_game(&mut self, game: GameState) {
        self.stage(Key::Game, Value::Game(game));
    }

    pub(in crate::layer) fn put_asset(&mut self, asset: Asset) {
        self.stage(Key::Asset(asset.kind), Value::Asset(asset));
    }

    pub(in crate::layer) fn put_team(&mut self, team: Team) {
        self.stage(Key::Team(team.id), Value::Team(team));
    }

    pub(in crate::layer) fn put_card(&mut self, card: Card) {
        self.stage(Key::Card(card.id), Value::Card(card));
    }

    pub(in crate::layer) async fn load_game(&self) -> Result<GameState, EngineError> {
        match self.get(&Key::Game).await {
            Some(Value::Game(game)) => Ok(game),
            _ => Err(EngineError::GameNotInitialized),
        }
    }

    pub(in crate::layer) async fn load_asset(&self, kind: AssetKind) -> Result<Asset, EngineError> {
        match self.get(&Key::Asset(kind)).await {
            Some(Value::Asset(asset)) => Ok(asset),
            _ => Err(EngineError::AssetNotFound(kind)),
        }
    }

    pub(in crate::layer) async fn load_team(&self, id: TeamId) -> Result<Team, EngineError> {
        match self.get(&Key::Team(id)).await {
            Some(Value::Team(team)) => Ok(team),
            _ => Err(EngineError::TeamNotFound(id)),
        }
    }

    pub(in crate::layer) async fn load_card(&self, id: CardId) -> Result<Card, EngineError> {
        match self.get(&Key::Card(id)).await {
            Some(Value::Card(card)) => Ok(card),
            _ => Err(EngineError::CardNotFound(id)),
        }
    }

    pub(in crate::layer) async fn load_teams(
        &self,
        ids: &[TeamId],
    ) -> Result<Vec<Team>, EngineError> {
        let mut teams = Vec::with_capacity(ids.len());
        for id in ids {
            teams.push(self.load_team(*id).await?);
        }
        Ok(teams)
    }

    pub(in crate::layer) async fn price_map(
        &self,
    ) -> Result<BTreeMap<AssetKind, f64>, EngineError> {
        let mut prices = BTreeMap::new();
        for kind in AssetKind::ALL {
            prices.insert(kind, self.load_asset(kind).await?.current_value);
        }
        Ok(prices)
    }

    /// Checkpoint the current round into the game's snapshot map and return
    /// the leaderboard computed along the way.
    pub(in crate::layer) async fn capture_snapshot(
        &mut self,
        game: &mut GameState,
    ) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let prices = self.price_map().await?;
        let teams = self.load_teams(&game.registered_teams).await?;
        let board = leaderboard::compute(&teams, &prices);
        let holdings = teams
            .iter()
            .map(|team| (team.id, team.holdings.clone()))
            .collect();
        game.snapshots.insert(
            game.current_round,
            RoundSnapshot {
                round: game.current_round,
                timestamp_ms: self.now_ms,
                asset_prices: prices,
                holdings,
                leaderboard: board.clone(),
                drawn_cards: game.drawn_cards.clone(),
            },
        );
        Ok(board)
    }
}

impl<'a, S: State> State for Layer<'a, S> {
    async fn get(&self, key: &Key) -> Option<Value> {
        match self.pending.get(key) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.state.get(key).await,
        }
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.pending.insert(key, Status::Update(value));
    }

    async fn delete(&mut self, key: &Key) {
        self.pending.insert(*key, Status::Delete);
    }
}

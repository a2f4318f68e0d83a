use matrix_types::config::{MAX_QUALIFIED_TEAMS, MAX_ROUNDS, MIN_ROUNDS, SHUFFLE_CADENCE};
use matrix_types::{
    Asset, AssetKind, EngineError, Event, GameState, HistoryEvent, Key, Phase,
};
use tracing::{debug, info};

use crate::layer::Layer;
use crate::state::State;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_initialize_game(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        if self.get(&Key::Game).await.is_some() {
            return Err(EngineError::StateConflict("game already initialized".into()));
        }
        for kind in AssetKind::ALL {
            self.put_asset(Asset::new(kind, self.now_ms));
        }
        let mut game = GameState::new();
        self.capture_snapshot(&mut game).await?;
        self.put_game(game);
        info!("game initialized");
        Ok(vec![Event::GameInitialized {
            round: MIN_ROUNDS,
            assets_created: AssetKind::ALL.len(),
        }])
    }

    pub(in crate::layer) async fn handle_start_round2(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if game.phase != Phase::Round1 {
            return Err(EngineError::StateConflict(
                "round 2 can only start from round 1".into(),
            ));
        }
        let qualified: Vec<_> = self
            .load_teams(&game.registered_teams)
            .await?
            .into_iter()
            .filter(|team| team.qualified)
            .map(|team| team.id)
            .take(MAX_QUALIFIED_TEAMS)
            .collect();
        if qualified.is_empty() {
            return Err(EngineError::Validation(
                "no teams have qualified for round 2".into(),
            ));
        }

        game.phase = Phase::Round2;
        game.team_order = qualified.clone();
        game.current_team_index = 0;
        game.active_team = qualified.first().copied();
        game.pending.clear();
        // Round 2 restarts the round count with a fresh, shuffled deck.
        game.current_round = MIN_ROUNDS;
        self.reinitialize_cards(&mut game).await?;
        self.reshuffle(&mut game).await?;
        let board = self.capture_snapshot(&mut game).await?;
        let round = game.current_round;
        self.put_game(game);
        info!(round, teams = qualified.len(), "round 2 started");
        Ok(vec![
            Event::Round2Started {
                round,
                teams: qualified,
            },
            Event::LeaderboardUpdated { entries: board },
        ])
    }

    pub(in crate::layer) async fn handle_next_round(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if !matches!(game.phase, Phase::Round1 | Phase::Round2) {
            return Err(EngineError::StateConflict("game is not running".into()));
        }
        let round = game.current_round + 1;
        if round > MAX_ROUNDS {
            return Err(EngineError::StateConflict(format!(
                "game is capped at {MAX_ROUNDS} rounds"
            )));
        }

        // Checkpoint the round being left before anything moves, so a
        // rollback lands on its closing state.
        let board = self.capture_snapshot(&mut game).await?;

        // Every asset gets an explicit marker at the unchanged value, so
        // charts have a point for every round.
        for kind in AssetKind::ALL {
            let mut asset = self.load_asset(kind).await?;
            let value = asset.current_value;
            asset.set_price(value, round, HistoryEvent::RoundMarker, self.now_ms);
            self.put_asset(asset);
        }

        game.current_round = round;
        let deck_shuffled = round % SHUFFLE_CADENCE == 0;
        if deck_shuffled {
            self.reshuffle(&mut game).await?;
        }

        game.current_team_index = 0;
        game.active_team = game.team_order.first().copied();
        // A round boundary cancels unconsumed inter-team effects.
        game.pending.clear();
        self.put_game(game);
        debug!(round, deck_shuffled, "round advanced");
        Ok(vec![
            Event::RoundAdvanced {
                round,
                deck_shuffled,
            },
            Event::LeaderboardUpdated { entries: board },
        ])
    }

    /// Roll the game back one round from its checkpoint: prices and holdings
    /// are restored and cards drawn since the checkpoint return to the deck.
    /// Balances are deliberately left alone.
    pub(in crate::layer) async fn handle_previous_round(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if game.current_round <= MIN_ROUNDS {
            return Err(EngineError::StateConflict(
                "already at the first round".into(),
            ));
        }
        let target = game.current_round - 1;
        let snapshot = game
            .snapshots
            .get(&target)
            .cloned()
            .ok_or_else(|| {
                EngineError::StateConflict(format!("no checkpoint for round {target}"))
            })?;

        for (kind, price) in &snapshot.asset_prices {
            let mut asset = self.load_asset(*kind).await?;
            asset.set_price(*price, target, HistoryEvent::Rollback, self.now_ms);
            self.put_asset(asset);
        }
        for id in game.registered_teams.clone() {
            let mut team = self.load_team(id).await?;
            team.holdings = snapshot.holdings.get(&id).cloned().unwrap_or_default();
            self.put_team(team);
        }

        // Cards drawn after the checkpoint return to the pool. Deck order and
        // cursor are deliberately untouched; the wrapping draw scan reaches
        // returned cards, and callers reshuffle if order matters.
        let restored: Vec<_> = game
            .drawn_cards
            .difference(&snapshot.drawn_cards)
            .copied()
            .collect();
        for id in &restored {
            let mut card = self.load_card(*id).await?;
            card.drawn = false;
            self.put_card(card);
        }
        game.drawn_cards = snapshot.drawn_cards.clone();

        game.current_round = target;
        // The restored round's own checkpoint survives and already describes
        // the state just restored; only the abandoned future is pruned.
        game.snapshots.retain(|&round, _| round <= target);
        game.pending.clear();
        let board = self.final_leaderboard(&game).await?;
        self.put_game(game);
        info!(round = target, cards_restored = restored.len(), "round rolled back");
        Ok(vec![
            Event::RoundRolledBack {
                round: target,
                cards_restored: restored.len(),
            },
            Event::LeaderboardUpdated { entries: board },
        ])
    }

    pub(in crate::layer) async fn handle_next_team(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if !matches!(game.phase, Phase::Round1 | Phase::Round2) {
            return Err(EngineError::StateConflict("game is not running".into()));
        }
        if game.team_order.is_empty() {
            return Err(EngineError::StateConflict("no teams in turn order".into()));
        }

        // A freeze only lasts the frozen team's own turn.
        if let Some(outgoing_id) = game.active_team {
            let mut outgoing = self.load_team(outgoing_id).await?;
            if outgoing.trade_frozen {
                outgoing.trade_frozen = false;
                outgoing.frozen_asset = None;
                self.put_team(outgoing);
            }
        }

        game.current_team_index = (game.current_team_index + 1) % game.team_order.len();
        let incoming_id = game.team_order[game.current_team_index];
        game.active_team = Some(incoming_id);
        let mut incoming = self.load_team(incoming_id).await?;

        let trade_frozen = game.pending.trade_frozen;
        if trade_frozen {
            incoming.trade_frozen = true;
            incoming.frozen_asset = None;
            game.pending.trade_frozen = false;
        }
        let mut events = Vec::new();
        let mut shocked = None;
        if game.pending.market_shock {
            game.pending.market_shock = false;
            if let Some((asset, previous, current)) =
                self.shock_highest_holding(&incoming, game.current_round).await?
            {
                shocked = Some(asset);
                events.push(Event::AssetPriceChanged {
                    asset,
                    previous,
                    current,
                    event: HistoryEvent::CardEffect,
                    round: game.current_round,
                });
            }
        }
        let round = game.current_round;

        self.put_team(incoming);
        self.put_game(game);
        events.push(Event::TeamTurnChanged {
            team: incoming_id,
            round,
            trade_frozen,
            market_shock: shocked,
        });
        Ok(events)
    }

    pub(in crate::layer) async fn handle_end_game(&mut self) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if game.phase == Phase::Completed {
            return Err(EngineError::StateConflict("game already ended".into()));
        }
        game.phase = Phase::Completed;
        game.active_team = None;
        let board = self.final_leaderboard(&game).await?;
        let round = game.current_round;
        self.put_game(game);
        info!(round, "game ended");
        Ok(vec![
            Event::GameEnded { round },
            Event::LeaderboardUpdated { entries: board },
        ])
    }

    /// Wipe everything back to a fresh game while keeping registrations:
    /// assets to base values, teams to starting balances, cards undrawn,
    /// and the trade audit log purged.
    pub(in crate::layer) async fn handle_reset_game(&mut self) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;

        for kind in AssetKind::ALL {
            let mut asset = self.load_asset(kind).await?;
            asset.reset(self.now_ms);
            self.put_asset(asset);
        }
        let teams = game.registered_teams.clone();
        for id in &teams {
            let mut team = self.load_team(*id).await?;
            team.reset();
            self.put_team(team);
        }
        for seq in 0..game.transaction_seq {
            self.delete(&Key::Transaction(seq)).await;
        }

        game.current_round = MIN_ROUNDS;
        game.phase = if teams.is_empty() {
            Phase::Registration
        } else {
            Phase::Round1
        };
        game.team_order = teams.clone();
        game.current_team_index = 0;
        game.active_team = teams.first().copied();
        game.snapshots.clear();
        game.pending.clear();
        game.transaction_seq = 0;
        let card_count = self.reinitialize_cards(&mut game).await?;
        self.capture_snapshot(&mut game).await?;
        self.put_game(game);
        info!(teams = teams.len(), "game reset");
        Ok(vec![Event::GameReset {
            assets: AssetKind::ALL.len(),
            teams: teams.len(),
            cards: card_count,
        }])
    }

    async fn final_leaderboard(
        &self,
        game: &GameState,
    ) -> Result<Vec<matrix_types::LeaderboardEntry>, EngineError> {
        let prices = self.price_map().await?;
        let teams = self.load_teams(&game.registered_teams).await?;
        Ok(crate::leaderboard::compute(&teams, &prices))
    }
}

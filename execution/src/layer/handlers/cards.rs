use matrix_types::config::{DECK_SIZE, MARKET_SHOCK_PERCENT};
use matrix_types::{
    AssetKind, CardEffectOutcome, CardId, CardKind, EngineError, Event, GameState, HistoryEvent,
    Key, PercentRange, Team, TeamId, Value,
};
use rand::Rng;
use tracing::debug;

use crate::deck;
use crate::layer::Layer;
use crate::pricing;
use crate::state::State;

impl<'a, S: State> Layer<'a, S> {
    pub(in crate::layer) async fn handle_initialize_cards(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        let count = self.reinitialize_cards(&mut game).await?;
        self.put_game(game);
        Ok(vec![Event::CardsInitialized { count }])
    }

    /// Destructive repopulate: every card is recreated undrawn and the deck
    /// returns to canonical order with the cursor at zero. Rebuilt cards are
    /// staged at the version of the record they replace so the guarded
    /// commit accepts them.
    pub(in crate::layer) async fn reinitialize_cards(
        &mut self,
        game: &mut GameState,
    ) -> Result<usize, EngineError> {
        let cards = deck::build_population();
        let count = cards.len();
        game.card_deck = cards.iter().map(|card| card.id).collect();
        game.current_card_index = 0;
        game.drawn_cards.clear();
        game.deck_layout = None;
        game.last_shuffle_round = 0;
        for mut card in cards {
            if let Some(Value::Card(existing)) = self.get(&Key::Card(card.id)).await {
                card.version = existing.version;
            }
            self.put_card(card);
        }
        Ok(count)
    }

    pub(in crate::layer) async fn handle_shuffle_deck(
        &mut self,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        let remaining = self.reshuffle(&mut game).await?;
        let round = game.current_round;
        self.put_game(game);
        Ok(vec![Event::DeckShuffled { round, remaining }])
    }

    /// Shuffle the undrawn pool into a fresh deck order with a new table
    /// layout and the cursor back at zero. Drawn cards stay out of the deck
    /// until a reinitialize or a rollback returns them. Populates the card
    /// set on first use.
    pub(in crate::layer) async fn reshuffle(
        &mut self,
        game: &mut GameState,
    ) -> Result<usize, EngineError> {
        if game.card_deck.is_empty() && game.drawn_cards.is_empty() {
            self.reinitialize_cards(game).await?;
        }
        let mut order: Vec<CardId> = (0..DECK_SIZE as u8)
            .map(CardId)
            .filter(|id| !game.drawn_cards.contains(id))
            .collect();
        deck::shuffle_order(&mut order, &mut self.rng);
        game.card_deck = order;
        game.deck_layout = Some(deck::generate_layout(
            &game.card_deck,
            &mut self.rng,
            self.now_ms,
        ));
        game.current_card_index = 0;
        game.last_shuffle_round = game.current_round;
        debug!(round = game.current_round, remaining = game.card_deck.len(), "deck reshuffled");
        Ok(game.card_deck.len())
    }

    pub(in crate::layer) async fn handle_draw_card(
        &mut self,
        team_id: TeamId,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if let Some(events) = self.consume_insider_exemption(team_id).await? {
            return Ok(events);
        }

        if game.card_deck.is_empty() {
            return Err(EngineError::StateConflict(
                "cards have not been initialized".into(),
            ));
        }
        // The cursor wraps; drawn cards are skipped in place.
        let len = game.card_deck.len();
        let mut index = game.current_card_index % len;
        let mut found = None;
        for _ in 0..len {
            let id = game.card_deck[index];
            if !game.drawn_cards.contains(&id) {
                found = Some((index, id));
                break;
            }
            index = (index + 1) % len;
        }
        let Some((index, id)) = found else {
            return Err(EngineError::StateConflict("deck is exhausted".into()));
        };
        let mut card = self.load_card(id).await?;
        card.drawn = true;
        game.drawn_cards.insert(id);
        game.current_card_index = (index + 1) % len;
        let round = game.current_round;

        self.put_card(card);
        self.put_game(game);
        Ok(vec![Event::CardDrawn {
            team: team_id,
            card: id,
            round,
        }])
    }

    /// The commit half of the preview-then-select flow: the named card must
    /// still be undrawn. Deck order and cursor are left alone; the draw scan
    /// skips the card wherever it sits.
    pub(in crate::layer) async fn handle_draw_specific_card(
        &mut self,
        team_id: TeamId,
        id: CardId,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        if let Some(events) = self.consume_insider_exemption(team_id).await? {
            return Ok(events);
        }

        let mut card = self.load_card(id).await?;
        if card.drawn {
            return Err(EngineError::StateConflict(format!(
                "card {id} has already been drawn"
            )));
        }
        card.drawn = true;
        game.drawn_cards.insert(id);
        let round = game.current_round;

        self.put_card(card);
        self.put_game(game);
        Ok(vec![Event::CardDrawn {
            team: team_id,
            card: id,
            round,
        }])
    }

    /// Insider information spends the team's draw instead of drawing.
    async fn consume_insider_exemption(
        &mut self,
        team_id: TeamId,
    ) -> Result<Option<Vec<Event>>, EngineError> {
        let mut team = self.load_team(team_id).await?;
        if !team.has_insider_info {
            return Ok(None);
        }
        team.has_insider_info = false;
        self.put_team(team);
        Ok(Some(vec![Event::CardDrawSkipped {
            team: team_id,
            reason: "insider information exempts this team from drawing".into(),
        }]))
    }

    pub(in crate::layer) async fn handle_apply_card_effect(
        &mut self,
        card_id: CardId,
        team_id: TeamId,
        _next_team: Option<TeamId>,
    ) -> Result<Vec<Event>, EngineError> {
        let mut game = self.load_game().await?;
        let card = self.load_card(card_id).await?;
        let mut team = self.load_team(team_id).await?;
        if !card.drawn {
            return Err(EngineError::StateConflict(format!(
                "card {card_id} has not been drawn"
            )));
        }

        // An armed reversal is spent by whichever card comes next, even one
        // with no percentage to flip.
        let reversed = game.pending.reverse_impact;
        game.pending.reverse_impact = false;

        let mut events = Vec::new();
        let outcome = match card.kind {
            CardKind::AssetIncrease { asset, range }
            | CardKind::AssetDecrease { asset, range } => {
                let mut percent = self.sample_percent(range);
                if reversed {
                    percent = -percent;
                }
                let mut target = self.load_asset(asset).await?;
                let previous = target.current_value;
                let current = pricing::apply_percent(previous, percent);
                target.set_price(current, game.current_round, HistoryEvent::CardEffect, self.now_ms);
                self.put_asset(target);
                events.push(Event::AssetPriceChanged {
                    asset,
                    previous,
                    current,
                    event: HistoryEvent::CardEffect,
                    round: game.current_round,
                });
                CardEffectOutcome::AssetMove {
                    asset,
                    previous,
                    current,
                    percent,
                    reversed,
                }
            }
            // Inter-team effects never fire here: they arm a pending flag
            // that the turn advance consumes when the next team comes up.
            CardKind::InterTeam { effect } => {
                use matrix_types::SpecialEffect::*;
                match effect {
                    TradeFreeze => {
                        game.pending.trade_frozen = true;
                        CardEffectOutcome::PendingTradeFreeze
                    }
                    MarketShock => {
                        game.pending.market_shock = true;
                        CardEffectOutcome::PendingMarketShock
                    }
                    InsiderInformation => {
                        team.has_insider_info = true;
                        self.put_team(team);
                        CardEffectOutcome::InsiderGranted { team: team_id }
                    }
                    ReverseImpact => {
                        game.pending.reverse_impact = true;
                        CardEffectOutcome::PendingReverseImpact
                    }
                }
            }
            CardKind::Neutral => CardEffectOutcome::Nothing,
        };

        self.put_game(game);
        events.push(Event::CardEffectApplied {
            card: card_id,
            team: team_id,
            outcome,
        });
        Ok(events)
    }

    /// Cut the price of the team's highest-value holding by the market-shock
    /// percent. Teams holding nothing are unaffected. Ties resolve in
    /// canonical asset order.
    pub(in crate::layer) async fn shock_highest_holding(
        &mut self,
        target: &Team,
        round: u32,
    ) -> Result<Option<(AssetKind, f64, f64)>, EngineError> {
        let mut best: Option<(AssetKind, f64)> = None;
        for kind in AssetKind::ALL {
            let units = target.holding(kind);
            if units == 0 {
                continue;
            }
            let value = self.load_asset(kind).await?.current_value * f64::from(units);
            if best.map_or(true, |(_, held)| value > held) {
                best = Some((kind, value));
            }
        }
        let Some((kind, _)) = best else {
            return Ok(None);
        };
        let mut asset = self.load_asset(kind).await?;
        let previous = asset.current_value;
        let current = pricing::apply_percent(previous, MARKET_SHOCK_PERCENT);
        asset.set_price(current, round, HistoryEvent::CardEffect, self.now_ms);
        self.put_asset(asset);
        Ok(Some((kind, previous, current)))
    }

    fn sample_percent(&mut self, range: PercentRange) -> f64 {
        if (range.max - range.min).abs() < f64::EPSILON {
            range.min
        } else {
            self.rng.gen_range(range.min..=range.max)
        }
    }
}

use matrix_types::config::{asset_spec, MIN_ASSET_VALUE};
use matrix_types::{
    AssetKind, EngineError, Event, HistoryEvent, Key, Phase, TeamId, TradeAction, TradeItem,
    TradeOutcome, TradeReceipt, Value,
};
use tracing::debug;

use crate::layer::Layer;
use crate::pricing;
use crate::state::{State, Status};

/// Result of one executed trade leg.
pub(in crate::layer) struct TradeExecution {
    pub receipt: TradeReceipt,
    /// `(previous, current)` when the trade's volume stepped the price.
    pub price_move: Option<(f64, f64)>,
}

impl<'a, S: State> Layer<'a, S> {
    /// Execute a single market trade against the staged state. Shared by the
    /// single-trade handler and each leg of a batch.
    pub(in crate::layer) async fn execute_trade(
        &mut self,
        team_id: TeamId,
        kind: AssetKind,
        action: TradeAction,
        quantity: u32,
    ) -> Result<TradeExecution, EngineError> {
        if quantity == 0 {
            return Err(EngineError::Validation("quantity must be positive".into()));
        }
        let mut game = self.load_game().await?;
        if !matches!(game.phase, Phase::Round1 | Phase::Round2) {
            return Err(EngineError::StateConflict("trading is closed".into()));
        }
        let mut team = self.load_team(team_id).await?;
        let mut asset = self.load_asset(kind).await?;

        // A frozen team is pinned to the first asset it touches this turn.
        if team.trade_frozen {
            match team.frozen_asset {
                Some(pinned) if pinned != kind => {
                    return Err(EngineError::StateConflict(format!(
                        "trade freeze: team may only trade {pinned} this turn"
                    )));
                }
                None => team.frozen_asset = Some(kind),
                Some(_) => {}
            }
        }

        let price = asset.current_value;
        let total = price * f64::from(quantity);
        match action {
            TradeAction::Buy => {
                if team.balance < total {
                    return Err(EngineError::InsufficientFunds {
                        needed: total,
                        available: team.balance,
                    });
                }
                team.balance -= total;
                team.add_holding(kind, quantity);
            }
            TradeAction::Sell => {
                let held = team.holding(kind);
                if held < quantity {
                    return Err(EngineError::InsufficientHoldings {
                        asset: kind,
                        needed: quantity,
                        available: held,
                    });
                }
                team.balance += total;
                team.remove_holding(kind, quantity);
            }
        }

        // Fold volume into the side's counter; the trade itself fills at the
        // pre-step price.
        let spec = asset_spec(kind);
        let cumulative = match action {
            TradeAction::Buy => asset.cumulative_buy_volume,
            TradeAction::Sell => asset.cumulative_sell_volume,
        };
        let step = pricing::step_price(&spec, asset.current_value, cumulative, quantity, action);
        match action {
            TradeAction::Buy => asset.cumulative_buy_volume = step.residual_volume,
            TradeAction::Sell => asset.cumulative_sell_volume = step.residual_volume,
        }
        let price_move = if step.multiplier > 0 {
            let previous = asset.current_value;
            asset.set_price(step.new_value, game.current_round, HistoryEvent::Trade, self.now_ms);
            debug!(
                asset = %kind,
                previous,
                current = step.new_value,
                percent = step.percent_applied,
                "threshold step"
            );
            Some((previous, step.new_value))
        } else {
            None
        };

        let receipt = TradeReceipt {
            team: team_id,
            round: game.current_round,
            asset: kind,
            action,
            quantity,
            price_per_unit: price,
            total,
            counterparty: None,
            balance_after: team.balance,
        };
        let seq = game.transaction_seq;
        game.transaction_seq += 1;
        self.record_transaction(seq, receipt.clone());

        self.put_team(team);
        self.put_asset(asset);
        self.put_game(game);
        Ok(TradeExecution {
            receipt,
            price_move,
        })
    }

    pub(in crate::layer) async fn handle_trade(
        &mut self,
        team: TeamId,
        asset: AssetKind,
        action: TradeAction,
        quantity: u32,
    ) -> Result<Vec<Event>, EngineError> {
        let execution = self.execute_trade(team, asset, action, quantity).await?;
        let round = execution.receipt.round;
        let mut events = Vec::new();
        if let Some((previous, current)) = execution.price_move {
            events.push(Event::AssetPriceChanged {
                asset,
                previous,
                current,
                event: HistoryEvent::Trade,
                round,
            });
        }
        events.push(Event::TradeExecuted {
            receipt: execution.receipt,
            price_changed: execution.price_move.is_some(),
        });
        Ok(events)
    }

    /// Apply each leg in its own nested layer so a rejected leg rolls back
    /// cleanly while the rest of the batch proceeds.
    pub(in crate::layer) async fn handle_batch_trade(
        &mut self,
        team: TeamId,
        action: TradeAction,
        items: &[TradeItem],
    ) -> Result<Vec<Event>, EngineError> {
        if items.is_empty() {
            return Err(EngineError::Validation("batch must not be empty".into()));
        }
        let mut events = Vec::new();
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let mut leg = Layer::new(&*self, self.rng.clone(), self.now_ms);
            match leg.execute_trade(team, item.asset, action, item.quantity).await {
                Ok(execution) => {
                    for (key, status) in leg.commit() {
                        self.pending.insert(key, status);
                    }
                    if let Some((previous, current)) = execution.price_move {
                        events.push(Event::AssetPriceChanged {
                            asset: item.asset,
                            previous,
                            current,
                            event: HistoryEvent::Trade,
                            round: execution.receipt.round,
                        });
                    }
                    outcomes.push(TradeOutcome::Filled {
                        receipt: execution.receipt,
                    });
                }
                Err(err) => outcomes.push(TradeOutcome::Rejected {
                    asset: item.asset,
                    quantity: item.quantity,
                    reason: err.to_string(),
                }),
            }
        }
        let succeeded = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, TradeOutcome::Filled { .. }))
            .count();
        let failed = outcomes.len() - succeeded;
        events.push(Event::BatchTradeExecuted {
            team,
            action,
            outcomes,
            succeeded,
            failed,
        });
        Ok(events)
    }

    /// Direct transfer between two teams at an agreed price. No market
    /// volume is generated, so prices never move.
    pub(in crate::layer) async fn handle_team_trade(
        &mut self,
        from: TeamId,
        to: TeamId,
        kind: AssetKind,
        quantity: u32,
        agreed_price: f64,
    ) -> Result<Vec<Event>, EngineError> {
        if from == to {
            return Err(EngineError::Validation(
                "a team cannot trade with itself".into(),
            ));
        }
        if quantity == 0 {
            return Err(EngineError::Validation("quantity must be positive".into()));
        }
        if agreed_price <= 0.0 {
            return Err(EngineError::Validation(
                "agreed price must be positive".into(),
            ));
        }
        let mut game = self.load_game().await?;
        if !matches!(game.phase, Phase::Round1 | Phase::Round2) {
            return Err(EngineError::StateConflict("trading is closed".into()));
        }
        let mut seller = self.load_team(from).await?;
        let mut buyer = self.load_team(to).await?;

        let held = seller.holding(kind);
        if held < quantity {
            return Err(EngineError::InsufficientHoldings {
                asset: kind,
                needed: quantity,
                available: held,
            });
        }
        let total = agreed_price * f64::from(quantity);
        if buyer.balance < total {
            return Err(EngineError::InsufficientFunds {
                needed: total,
                available: buyer.balance,
            });
        }

        seller.remove_holding(kind, quantity);
        seller.balance += total;
        buyer.add_holding(kind, quantity);
        buyer.balance -= total;

        let seller_receipt = TradeReceipt {
            team: from,
            round: game.current_round,
            asset: kind,
            action: TradeAction::Sell,
            quantity,
            price_per_unit: agreed_price,
            total,
            counterparty: Some(to),
            balance_after: seller.balance,
        };
        let buyer_receipt = TradeReceipt {
            team: to,
            round: game.current_round,
            asset: kind,
            action: TradeAction::Buy,
            quantity,
            price_per_unit: agreed_price,
            total,
            counterparty: Some(from),
            balance_after: buyer.balance,
        };
        let seq = game.transaction_seq;
        game.transaction_seq += 2;
        self.record_transaction(seq, seller_receipt.clone());
        self.record_transaction(seq + 1, buyer_receipt.clone());

        self.put_team(seller);
        self.put_team(buyer);
        self.put_game(game);
        Ok(vec![Event::TeamTradeExecuted {
            seller: seller_receipt,
            buyer: buyer_receipt,
        }])
    }

    pub(in crate::layer) async fn handle_manual_set_value(
        &mut self,
        kind: AssetKind,
        value: f64,
    ) -> Result<Vec<Event>, EngineError> {
        if !value.is_finite() || value < MIN_ASSET_VALUE {
            return Err(EngineError::Validation(format!(
                "asset value must be at least {MIN_ASSET_VALUE}"
            )));
        }
        let game = self.load_game().await?;
        let mut asset = self.load_asset(kind).await?;
        let previous = asset.current_value;
        asset.set_price(
            value,
            game.current_round,
            HistoryEvent::ManualAdjustment,
            self.now_ms,
        );
        self.put_asset(asset);
        Ok(vec![Event::AssetPriceChanged {
            asset: kind,
            previous,
            current: value,
            event: HistoryEvent::ManualAdjustment,
            round: game.current_round,
        }])
    }

    fn record_transaction(&mut self, seq: u64, receipt: TradeReceipt) {
        self.pending
            .insert(Key::Transaction(seq), Status::Update(Value::Transaction(receipt)));
    }
}

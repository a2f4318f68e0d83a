//! End-to-end command flows over an in-memory backend.

use matrix_types::config::{DECK_SIZE, INITIAL_BALANCE, MIN_ASSET_VALUE};
use matrix_types::{
    AssetKind, Card, CardEffectOutcome, CardId, Command, EngineError, Event, HistoryEvent, Key,
    Phase, TradeAction, TradeItem, TradeOutcome, Value,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::mocks::{apply, register_team, setup_game, NOW_MS};
use crate::state::{Memory, State};
use crate::{queries, Layer};

// Canonical population order: asset increases occupy ids 0..12, with the
// three crypto +30% cards first; inter-team cards sit at ids 24..32.
const CRYPTO_INCREASE: CardId = CardId(0);
const TRADE_FREEZE: CardId = CardId(24);
const MARKET_SHOCK: CardId = CardId(26);
const INSIDER: CardId = CardId(28);
const REVERSE_IMPACT: CardId = CardId(30);
const NEUTRAL: CardId = CardId(32);

/// Initialize game and cards but leave the deck in canonical order, so
/// tests can reason about which card comes next.
async fn setup_unshuffled(memory: &mut Memory) {
    apply(memory, 0, NOW_MS, Command::InitializeGame).await.unwrap();
    apply(memory, 0, NOW_MS, Command::InitializeCards).await.unwrap();
}

/// Mark a card drawn directly in the backend, bypassing the deck cursor.
async fn force_draw(memory: &mut Memory, id: CardId) {
    let Some(Value::Card(mut card)) = memory.get(&Key::Card(id)).await else {
        panic!("card {id} not found");
    };
    card.drawn = true;
    memory.insert(Key::Card(id), Value::Card(card)).await;
}

#[tokio::test]
async fn full_game_flow_produces_consistent_state() {
    let mut memory = Memory::default();
    setup_game(&mut memory, 42).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let _beta = register_team(&mut memory, 0, "Beta").await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: alpha,
            asset: AssetKind::Gold,
            action: TradeAction::Buy,
            quantity: 10,
        },
    )
    .await
    .unwrap();

    let portfolio = queries::portfolio(&memory, alpha).await.unwrap();
    assert_eq!(portfolio.balance, INITIAL_BALANCE - 3_000.0);
    assert_eq!(portfolio.holdings[&AssetKind::Gold], 10);
    // Marked to market, gold holdings are worth exactly what was paid.
    assert_eq!(portfolio.portfolio_value, INITIAL_BALANCE);

    let board = queries::standings(&memory).await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].rank, 1);

    let events = apply(&mut memory, 0, NOW_MS, Command::NextRound).await.unwrap();
    assert!(matches!(
        events[0],
        Event::RoundAdvanced { round: 2, deck_shuffled: true }
    ));
    let game = queries::game(&memory).await.unwrap();
    assert_eq!(game.current_round, 2);
    // The round just left was checkpointed on the way out.
    assert!(game.snapshots.contains_key(&1));
    assert_eq!(game.active_team, Some(alpha));
}

#[tokio::test]
async fn buy_volume_is_never_double_counted_across_trades() {
    // Buying 40 then 100 crypto crosses the 100 threshold exactly once:
    // the price must land on 250, not 312.5.
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    for quantity in [40, 100] {
        apply(
            &mut memory,
            0,
            NOW_MS,
            Command::Trade {
                team,
                asset: AssetKind::Crypto,
                action: TradeAction::Buy,
                quantity,
            },
        )
        .await
        .unwrap();
    }

    let crypto = queries::asset(&memory, AssetKind::Crypto).await.unwrap();
    assert_eq!(crypto.current_value, 250.0);
    assert_eq!(crypto.cumulative_buy_volume, 40);
}

#[tokio::test]
async fn trades_fill_at_the_pre_step_price() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Crypto,
            action: TradeAction::Buy,
            quantity: 100,
        },
    )
    .await
    .unwrap();

    // The buy itself fills at 200 even though it steps the price to 250.
    let receipt = events
        .iter()
        .find_map(|event| match event {
            Event::TradeExecuted { receipt, .. } => Some(receipt.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(receipt.price_per_unit, 200.0);
    assert_eq!(receipt.total, 20_000.0);
    assert!(events.iter().any(|event| matches!(
        event,
        Event::AssetPriceChanged { current, .. } if *current == 250.0
    )));
}

#[tokio::test]
async fn sells_step_the_price_down_symmetrically() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Stock,
            action: TradeAction::Buy,
            quantity: 80,
        },
    )
    .await
    .unwrap();
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Stock,
            action: TradeAction::Sell,
            quantity: 80,
        },
    )
    .await
    .unwrap();

    let stock = queries::asset(&memory, AssetKind::Stock).await.unwrap();
    // 80 sold against the 80 sell threshold: one 25% step down from 250.
    assert_eq!(stock.current_value, 187.5);
    assert_eq!(stock.cumulative_sell_volume, 0);
    assert_eq!(stock.cumulative_buy_volume, 80);
}

#[tokio::test]
async fn rejected_commands_leave_no_partial_state() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::TreasuryBill,
            action: TradeAction::Buy,
            quantity: 1_000,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds { .. }));

    let portfolio = queries::portfolio(&memory, team).await.unwrap();
    assert_eq!(portfolio.balance, INITIAL_BALANCE);
    assert!(portfolio.holdings.is_empty());
    let game = queries::game(&memory).await.unwrap();
    assert_eq!(game.transaction_seq, 0);

    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Gold,
            action: TradeAction::Sell,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientHoldings { .. }));
}

#[tokio::test]
async fn batch_trade_fills_what_it_can_and_reports_the_rest() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::BatchTrade {
            team,
            action: TradeAction::Buy,
            items: vec![
                TradeItem { asset: AssetKind::Crypto, quantity: 10 },
                TradeItem { asset: AssetKind::Gold, quantity: 0 },
                TradeItem { asset: AssetKind::Stock, quantity: 5 },
            ],
        },
    )
    .await
    .unwrap();

    let Some(Event::BatchTradeExecuted { outcomes, succeeded, failed, .. }) =
        events.last()
    else {
        panic!("expected BatchTradeExecuted");
    };
    assert_eq!((*succeeded, *failed), (2, 1));
    assert!(matches!(
        outcomes[1],
        TradeOutcome::Rejected { asset: AssetKind::Gold, .. }
    ));

    // Both filled legs landed; the rejected one changed nothing.
    let portfolio = queries::portfolio(&memory, team).await.unwrap();
    assert_eq!(portfolio.holdings[&AssetKind::Crypto], 10);
    assert_eq!(portfolio.holdings[&AssetKind::Stock], 5);
    assert!(!portfolio.holdings.contains_key(&AssetKind::Gold));
    assert_eq!(queries::transactions(&memory).await.unwrap().len(), 2);
}

#[tokio::test]
async fn team_trade_transfers_at_the_agreed_price_without_moving_the_market() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let beta = register_team(&mut memory, 0, "Beta").await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: alpha,
            asset: AssetKind::Gold,
            action: TradeAction::Buy,
            quantity: 10,
        },
    )
    .await
    .unwrap();
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::TeamTrade {
            from: alpha,
            to: beta,
            asset: AssetKind::Gold,
            quantity: 4,
            agreed_price: 500.0,
        },
    )
    .await
    .unwrap();

    let seller = queries::portfolio(&memory, alpha).await.unwrap();
    let buyer = queries::portfolio(&memory, beta).await.unwrap();
    assert_eq!(seller.holdings[&AssetKind::Gold], 6);
    assert_eq!(seller.balance, INITIAL_BALANCE - 3_000.0 + 2_000.0);
    assert_eq!(buyer.holdings[&AssetKind::Gold], 4);
    assert_eq!(buyer.balance, INITIAL_BALANCE - 2_000.0);

    // Off-market transfer: no volume, no price movement.
    let gold = queries::asset(&memory, AssetKind::Gold).await.unwrap();
    assert_eq!(gold.current_value, 300.0);
    assert_eq!(gold.cumulative_buy_volume, 10);
}

#[tokio::test]
async fn deck_draws_without_replacement_until_exhausted() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let mut seen = std::collections::BTreeSet::new();
    for _ in 0..DECK_SIZE {
        let events = apply(&mut memory, 0, NOW_MS, Command::DrawCard { team })
            .await
            .unwrap();
        let Some(Event::CardDrawn { card, .. }) = events.first() else {
            panic!("expected CardDrawn");
        };
        assert!(seen.insert(*card), "card {card} drawn twice");
    }
    assert_eq!(seen.len(), DECK_SIZE);

    let err = apply(&mut memory, 0, NOW_MS, Command::DrawCard { team })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // Shuffling never resurrects drawn cards; only a reinitialize does.
    apply(&mut memory, 7, NOW_MS, Command::ShuffleDeck).await.unwrap();
    let deck = queries::deck_state(&memory).await.unwrap();
    assert_eq!(deck.remaining, 0);
    assert_eq!(deck.drawn, DECK_SIZE);

    apply(&mut memory, 0, NOW_MS, Command::InitializeCards).await.unwrap();
    let deck = queries::deck_state(&memory).await.unwrap();
    assert_eq!(deck.remaining, DECK_SIZE);
    assert_eq!(deck.drawn, 0);
}

#[tokio::test]
async fn reinitializing_a_used_deck_survives_version_checks() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    // Real draws move each drawn card's stored version past zero; the
    // rebuild must still commit cleanly on top of them.
    for _ in 0..3 {
        apply(&mut memory, 0, NOW_MS, Command::DrawCard { team }).await.unwrap();
    }
    apply(&mut memory, 0, NOW_MS, Command::InitializeCards).await.unwrap();

    let deck = queries::deck_state(&memory).await.unwrap();
    assert_eq!(deck.remaining, DECK_SIZE);
    assert_eq!(deck.drawn, 0);

    // And again: the second rebuild replaces once-rebuilt cards.
    apply(&mut memory, 0, NOW_MS, Command::DrawCard { team }).await.unwrap();
    apply(&mut memory, 0, NOW_MS, Command::InitializeCards).await.unwrap();
    assert!(queries::game(&memory).await.unwrap().drawn_cards.is_empty());
}

#[tokio::test]
async fn preview_samples_five_undrawn_cards_without_committing() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    register_team(&mut memory, 0, "Alpha").await;

    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let preview = queries::preview_cards(&memory, &mut rng).await.unwrap();
    assert_eq!(preview.len(), 5);
    let ids: std::collections::BTreeSet<CardId> =
        preview.iter().map(|card: &Card| card.id).collect();
    assert_eq!(ids.len(), 5);
    for card in &preview {
        assert!(!card.drawn);
    }
    // Previewing commits nothing.
    assert!(queries::game(&memory).await.unwrap().drawn_cards.is_empty());
}

#[tokio::test]
async fn specific_draws_take_any_undrawn_card_exactly_once() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::DrawSpecificCard { team, card: CardId(9) },
    )
    .await
    .unwrap();

    // The taken card never comes back: not by a second specific draw, not
    // in a preview sample.
    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::DrawSpecificCard { team, card: CardId(9) },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let preview = queries::preview_cards(&memory, &mut rng).await.unwrap();
    assert!(preview.iter().all(|card| card.id != CardId(9)));
}

#[tokio::test]
async fn specific_draws_honor_the_insider_exemption() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;
    force_draw(&mut memory, INSIDER).await;
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: INSIDER, team, next_team: None },
    )
    .await
    .unwrap();

    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::DrawSpecificCard { team, card: CardId(3) },
    )
    .await
    .unwrap();
    assert!(matches!(events.first(), Some(Event::CardDrawSkipped { .. })));
    let game = queries::game(&memory).await.unwrap();
    assert!(!game.drawn_cards.contains(&CardId(3)));
}

#[tokio::test]
async fn asset_card_moves_its_target_price() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;
    force_draw(&mut memory, CRYPTO_INCREASE).await;

    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: CRYPTO_INCREASE, team, next_team: None },
    )
    .await
    .unwrap();

    assert!(events.iter().any(|event| matches!(
        event,
        Event::CardEffectApplied {
            outcome: CardEffectOutcome::AssetMove { percent, reversed: false, .. },
            ..
        } if *percent == 30.0
    )));
    let crypto = queries::asset(&memory, AssetKind::Crypto).await.unwrap();
    assert_eq!(crypto.current_value, 260.0);
    assert_eq!(
        crypto.price_history.last().unwrap().event,
        HistoryEvent::CardEffect
    );
}

#[tokio::test]
async fn reverse_impact_flips_the_next_asset_card() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;
    force_draw(&mut memory, REVERSE_IMPACT).await;
    force_draw(&mut memory, CRYPTO_INCREASE).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: REVERSE_IMPACT, team, next_team: None },
    )
    .await
    .unwrap();
    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: CRYPTO_INCREASE, team, next_team: None },
    )
    .await
    .unwrap();

    // The +30% card lands as -30%, and the reversal is spent.
    assert!(events.iter().any(|event| matches!(
        event,
        Event::CardEffectApplied {
            outcome: CardEffectOutcome::AssetMove { percent, reversed: true, .. },
            ..
        } if *percent == -30.0
    )));
    let crypto = queries::asset(&memory, AssetKind::Crypto).await.unwrap();
    assert_eq!(crypto.current_value, 140.0);
    assert!(!queries::game(&memory).await.unwrap().pending.reverse_impact);
}

#[tokio::test]
async fn a_pending_reversal_is_spent_by_the_next_card_of_any_kind() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;
    force_draw(&mut memory, REVERSE_IMPACT).await;
    force_draw(&mut memory, NEUTRAL).await;
    force_draw(&mut memory, CRYPTO_INCREASE).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: REVERSE_IMPACT, team, next_team: None },
    )
    .await
    .unwrap();
    assert!(queries::game(&memory).await.unwrap().pending.reverse_impact);

    // A neutral card has nothing to flip but still consumes the reversal.
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: NEUTRAL, team, next_team: None },
    )
    .await
    .unwrap();
    assert!(!queries::game(&memory).await.unwrap().pending.reverse_impact);

    // So the asset card that follows lands at its own sign.
    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: CRYPTO_INCREASE, team, next_team: None },
    )
    .await
    .unwrap();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::CardEffectApplied {
            outcome: CardEffectOutcome::AssetMove { percent, reversed: false, .. },
            ..
        } if *percent == 30.0
    )));
    let crypto = queries::asset(&memory, AssetKind::Crypto).await.unwrap();
    assert_eq!(crypto.current_value, 260.0);
}

#[tokio::test]
async fn insider_information_skips_exactly_one_draw() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;
    force_draw(&mut memory, INSIDER).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: INSIDER, team, next_team: None },
    )
    .await
    .unwrap();

    let events = apply(&mut memory, 0, NOW_MS, Command::DrawCard { team })
        .await
        .unwrap();
    assert!(matches!(events.first(), Some(Event::CardDrawSkipped { .. })));

    // The exemption is spent: the next draw is a real one.
    let events = apply(&mut memory, 0, NOW_MS, Command::DrawCard { team })
        .await
        .unwrap();
    assert!(matches!(events.first(), Some(Event::CardDrawn { .. })));
}

#[tokio::test]
async fn trade_freeze_pins_the_next_team_to_one_asset_for_one_turn() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let beta = register_team(&mut memory, 0, "Beta").await;
    force_draw(&mut memory, TRADE_FREEZE).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: TRADE_FREEZE, team: alpha, next_team: None },
    )
    .await
    .unwrap();

    let events = apply(&mut memory, 0, NOW_MS, Command::NextTeam).await.unwrap();
    assert!(matches!(
        events.last(),
        Some(Event::TeamTurnChanged { team, trade_frozen: true, .. }) if *team == beta
    ));

    // First trade pins the asset; a different asset is rejected.
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: beta,
            asset: AssetKind::Crypto,
            action: TradeAction::Buy,
            quantity: 1,
        },
    )
    .await
    .unwrap();
    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: beta,
            asset: AssetKind::Gold,
            action: TradeAction::Buy,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));

    // The freeze expires when beta's turn ends.
    apply(&mut memory, 0, NOW_MS, Command::NextTeam).await.unwrap();
    let beta_team = queries::team(&memory, beta).await.unwrap();
    assert!(!beta_team.trade_frozen);
    assert!(beta_team.frozen_asset.is_none());
}

#[tokio::test]
async fn market_shock_hits_the_next_teams_highest_value_holding() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let beta = register_team(&mut memory, 0, "Beta").await;
    force_draw(&mut memory, MARKET_SHOCK).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: beta,
            asset: AssetKind::Crypto,
            action: TradeAction::Buy,
            quantity: 2,
        },
    )
    .await
    .unwrap();
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: beta,
            asset: AssetKind::Gold,
            action: TradeAction::Buy,
            quantity: 3,
        },
    )
    .await
    .unwrap();

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: MARKET_SHOCK, team: alpha, next_team: None },
    )
    .await
    .unwrap();
    let events = apply(&mut memory, 0, NOW_MS, Command::NextTeam).await.unwrap();

    // Gold (3 * 300) outweighs crypto (2 * 200), so gold takes the -10%.
    assert!(matches!(
        events.last(),
        Some(Event::TeamTurnChanged { market_shock: Some(AssetKind::Gold), .. })
    ));
    let gold = queries::asset(&memory, AssetKind::Gold).await.unwrap();
    assert_eq!(gold.current_value, 270.0);
}

#[tokio::test]
async fn market_shock_with_a_named_target_waits_for_the_turn_change() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let beta = register_team(&mut memory, 0, "Beta").await;
    force_draw(&mut memory, MARKET_SHOCK).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team: beta,
            asset: AssetKind::Gold,
            action: TradeAction::Buy,
            quantity: 3,
        },
    )
    .await
    .unwrap();

    // Naming the recipient does not fire the shock early: nothing moves
    // until the turn actually changes hands.
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: MARKET_SHOCK, team: alpha, next_team: Some(beta) },
    )
    .await
    .unwrap();
    let gold = queries::asset(&memory, AssetKind::Gold).await.unwrap();
    assert_eq!(gold.current_value, 300.0);
    assert!(queries::game(&memory).await.unwrap().pending.market_shock);

    apply(&mut memory, 0, NOW_MS, Command::NextTeam).await.unwrap();
    let gold = queries::asset(&memory, AssetKind::Gold).await.unwrap();
    assert_eq!(gold.current_value, 270.0);
    assert!(!queries::game(&memory).await.unwrap().pending.market_shock);
}

#[tokio::test]
async fn round_boundaries_cancel_a_pending_freeze() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let beta = register_team(&mut memory, 0, "Beta").await;
    force_draw(&mut memory, TRADE_FREEZE).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: TRADE_FREEZE, team: alpha, next_team: Some(beta) },
    )
    .await
    .unwrap();
    // The freeze is armed, not applied.
    assert!(queries::game(&memory).await.unwrap().pending.trade_frozen);
    assert!(!queries::team(&memory, beta).await.unwrap().trade_frozen);

    apply(&mut memory, 0, NOW_MS, Command::NextRound).await.unwrap();
    assert!(!queries::game(&memory).await.unwrap().pending.trade_frozen);

    // Whoever comes up next trades freely.
    let events = apply(&mut memory, 0, NOW_MS, Command::NextTeam).await.unwrap();
    assert!(matches!(
        events.last(),
        Some(Event::TeamTurnChanged { trade_frozen: false, .. })
    ));
}

#[tokio::test]
async fn rollback_restores_prices_holdings_and_cards_but_not_balances() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    apply(&mut memory, 3, NOW_MS, Command::NextRound).await.unwrap();

    // Round 2 activity: a threshold-stepping buy and a drawn card.
    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Crypto,
            action: TradeAction::Buy,
            quantity: 100,
        },
    )
    .await
    .unwrap();
    apply(&mut memory, 0, NOW_MS, Command::DrawCard { team }).await.unwrap();
    assert_eq!(queries::game(&memory).await.unwrap().drawn_cards.len(), 1);

    let events = apply(&mut memory, 0, NOW_MS, Command::PreviousRound)
        .await
        .unwrap();
    assert!(matches!(
        events.first(),
        Some(Event::RoundRolledBack { round: 1, cards_restored: 1 })
    ));

    let game = queries::game(&memory).await.unwrap();
    assert_eq!(game.current_round, 1);
    assert!(game.drawn_cards.is_empty());
    // The checkpoint for the restored round survives, so a future rollback
    // attempt can still see it; nothing newer remains.
    assert!(game.snapshots.contains_key(&1));
    assert!(!game.snapshots.contains_key(&2));

    let crypto = queries::asset(&memory, AssetKind::Crypto).await.unwrap();
    assert_eq!(crypto.current_value, 200.0);
    assert_eq!(
        crypto.price_history.last().unwrap().event,
        HistoryEvent::Rollback
    );

    let portfolio = queries::portfolio(&memory, team).await.unwrap();
    assert!(portfolio.holdings.is_empty());
    // Balances are not part of the checkpoint.
    assert_eq!(portfolio.balance, INITIAL_BALANCE - 20_000.0);

    // The rolled-back round can be replayed.
    apply(&mut memory, 5, NOW_MS, Command::NextRound).await.unwrap();
    assert_eq!(queries::game(&memory).await.unwrap().current_round, 2);
}

#[tokio::test]
async fn rollback_below_the_first_round_is_rejected() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    register_team(&mut memory, 0, "Alpha").await;

    let err = apply(&mut memory, 0, NOW_MS, Command::PreviousRound)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn qualification_gates_round_two() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let alpha = register_team(&mut memory, 0, "Alpha").await;
    let _beta = register_team(&mut memory, 0, "Beta").await;
    let gamma = register_team(&mut memory, 0, "Gamma").await;

    let err = apply(&mut memory, 0, NOW_MS, Command::StartRound2)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    apply(&mut memory, 0, NOW_MS, Command::QualifyTeam { team: alpha }).await.unwrap();
    apply(&mut memory, 0, NOW_MS, Command::QualifyTeam { team: gamma }).await.unwrap();
    let events = apply(&mut memory, 0, NOW_MS, Command::StartRound2).await.unwrap();

    assert!(matches!(
        events.first(),
        Some(Event::Round2Started { teams, .. }) if teams == &vec![alpha, gamma]
    ));
    let game = queries::game(&memory).await.unwrap();
    assert_eq!(game.phase, Phase::Round2);
    assert_eq!(game.team_order, vec![alpha, gamma]);
    assert_eq!(game.active_team, Some(alpha));

    // Registration is closed once round 2 begins.
    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::RegisterTeam { name: "Late".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn duplicate_team_names_are_rejected() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    register_team(&mut memory, 0, "Alpha").await;

    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::RegisterTeam { name: "Alpha".into() },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn manual_value_override_is_recorded_in_history() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ManualSetValue { asset: AssetKind::EuroBond, value: 123.0 },
    )
    .await
    .unwrap();
    let bond = queries::asset(&memory, AssetKind::EuroBond).await.unwrap();
    assert_eq!(bond.current_value, 123.0);
    assert_eq!(
        bond.price_history.last().unwrap().event,
        HistoryEvent::ManualAdjustment
    );

    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ManualSetValue { asset: AssetKind::EuroBond, value: MIN_ASSET_VALUE / 2.0 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn ending_the_game_closes_trading() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let events = apply(&mut memory, 0, NOW_MS, Command::EndGame).await.unwrap();
    assert!(matches!(events.first(), Some(Event::GameEnded { round: 1 })));
    assert_eq!(queries::game(&memory).await.unwrap().phase, Phase::Completed);

    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Crypto,
            action: TradeAction::Buy,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

#[tokio::test]
async fn reset_returns_to_baseline_and_purges_the_audit_log() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    apply(
        &mut memory,
        0,
        NOW_MS,
        Command::Trade {
            team,
            asset: AssetKind::Crypto,
            action: TradeAction::Buy,
            quantity: 120,
        },
    )
    .await
    .unwrap();
    apply(&mut memory, 0, NOW_MS, Command::DrawCard { team }).await.unwrap();
    assert_eq!(queries::transactions(&memory).await.unwrap().len(), 1);

    apply(&mut memory, 0, NOW_MS, Command::ResetGame).await.unwrap();

    let crypto = queries::asset(&memory, AssetKind::Crypto).await.unwrap();
    assert_eq!(crypto.current_value, 200.0);
    assert_eq!(crypto.cumulative_buy_volume, 0);
    let portfolio = queries::portfolio(&memory, team).await.unwrap();
    assert_eq!(portfolio.balance, INITIAL_BALANCE);
    assert!(portfolio.holdings.is_empty());
    let game = queries::game(&memory).await.unwrap();
    assert_eq!(game.current_round, 1);
    assert_eq!(game.phase, Phase::Round1);
    assert!(game.drawn_cards.is_empty());
    assert_eq!(game.transaction_seq, 0);
    assert!(queries::transactions(&memory).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_layers_detect_stale_commits() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let command = Command::Trade {
        team,
        asset: AssetKind::Crypto,
        action: TradeAction::Buy,
        quantity: 5,
    };
    // Both layers read the same state before either commits.
    let mut first = Layer::new(&memory, ChaCha8Rng::seed_from_u64(1), NOW_MS);
    first.apply(&command).await.unwrap();
    let first_changes = first.commit();
    let mut second = Layer::new(&memory, ChaCha8Rng::seed_from_u64(2), NOW_MS);
    second.apply(&command).await.unwrap();
    let second_changes = second.commit();

    memory.apply_guarded(first_changes).await.unwrap();
    let err = memory.apply_guarded(second_changes).await.unwrap_err();
    assert!(matches!(err, EngineError::VersionConflict { .. }));

    // Only the first trade landed.
    let portfolio = queries::portfolio(&memory, team).await.unwrap();
    assert_eq!(portfolio.holdings[&AssetKind::Crypto], 5);
}

#[tokio::test]
async fn neutral_cards_do_nothing() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;
    force_draw(&mut memory, NEUTRAL).await;

    let before = queries::assets(&memory).await.unwrap();
    let events = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: NEUTRAL, team, next_team: None },
    )
    .await
    .unwrap();
    assert!(matches!(
        events.first(),
        Some(Event::CardEffectApplied { outcome: CardEffectOutcome::Nothing, .. })
    ));
    assert_eq!(queries::assets(&memory).await.unwrap(), before);
}

#[tokio::test]
async fn applying_an_undrawn_card_is_rejected() {
    let mut memory = Memory::default();
    setup_unshuffled(&mut memory).await;
    let team = register_team(&mut memory, 0, "Alpha").await;

    let err = apply(
        &mut memory,
        0,
        NOW_MS,
        Command::ApplyCardEffect { card: CRYPTO_INCREASE, team, next_team: None },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, EngineError::StateConflict(_)));
}

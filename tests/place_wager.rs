#![allow(non_snake_case)]
use std::time::Duration;
use wager_session::{
    Error,
    SessionEvent,
    UserAction,
    surface::{
        Severity,
        StatsView,
    },
    test_helpers::{
        TestContext,
        place,
        settle_within,
    },
    types::{
        Amount,
        BetStatus,
        GameKind,
        Stat,
    },
};

#[tokio::test]
async fn place_wager__without_prediction_fails_before_any_network_call() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;
    controller.dispatch(SessionEvent::User(UserAction::SetStake {
        game: GameKind::Coin,
        input: "1".to_string(),
    }));
    let calls = ctx.ledger.call_count();

    // when
    let result = controller.place_wager(GameKind::Coin);

    // then
    assert_eq!(
        result,
        Err(Error::validation("Please select heads or tails!"))
    );
    assert_eq!(ctx.ledger.call_count(), calls);
    assert_eq!(controller.in_flight(), 0);
    assert!(controller.view().coin.enabled);
}

#[tokio::test]
async fn place_wager__dice_without_number_names_the_range() {
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;
    controller.set_stake(GameKind::Dice, "1".to_string());

    let result = controller.place_wager(GameKind::Dice);

    assert_eq!(
        result,
        Err(Error::validation("Please select a number (1-6)!"))
    );
}

#[tokio::test]
async fn place_wager__rejects_missing_or_zero_stake() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;
    controller.select_prediction(GameKind::Coin, 1).unwrap();
    let calls = ctx.ledger.call_count();

    for input in ["", "abc", "0", "-1"] {
        // when
        controller.set_stake(GameKind::Coin, input.to_string());
        let result = controller.place_wager(GameKind::Coin);

        // then
        assert_eq!(
            result,
            Err(Error::validation("Please enter a valid bet amount!")),
            "stake input {input:?}"
        );
    }
    assert_eq!(ctx.ledger.call_count(), calls);
}

#[tokio::test]
async fn place_wager__requires_a_connected_wallet() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.controller();
    controller.start();
    controller.settle().await;

    // when
    place(&mut controller, GameKind::Coin, 0, "1");

    // then
    assert_eq!(
        controller.surface().last_notification(),
        Some(&("Please connect your wallet first!".to_string(), Severity::Error))
    );
    assert_eq!(controller.in_flight(), 0);
}

#[tokio::test]
async fn select_prediction__rejects_out_of_range_values() {
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;

    assert!(controller.select_prediction(GameKind::Coin, 2).is_err());
    assert!(controller.select_prediction(GameKind::Dice, 0).is_err());
    assert!(controller.select_prediction(GameKind::Dice, 7).is_err());
    assert_eq!(controller.view().dice.prediction, None);
}

#[tokio::test]
async fn place_wager__confirmation_resets_form_and_refreshes_everything() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;

    // when
    place(&mut controller, GameKind::Coin, 1, "1.5");
    controller.settle().await;

    // then
    let bet = ctx.ledger.bet(1).unwrap();
    assert_eq!(bet.player, ctx.alice);
    assert_eq!(bet.prediction, 1);
    let view = controller.view();
    assert_eq!(view.coin.prediction, None);
    assert_eq!(view.coin.stake_input, "");
    assert!(view.coin.enabled);
    assert_eq!(view.bets.len(), 1);
    assert_eq!(view.bets[0].status, BetStatus::Pending);
    let StatsView::Ready(stats) = view.stats else {
        panic!("expected stats, got {:?}", view.stats);
    };
    assert_eq!(stats.total_bets, Stat::Available(1));
    assert_eq!(
        view.balance,
        Some(Stat::Available(Amount::parse_decimal("8.5").unwrap()))
    );
    let messages = controller.surface().messages();
    assert!(messages.contains(&"Bet submitted! Waiting for confirmation..."));
    assert!(messages.contains(&"Coin bet placed successfully!"));
    assert!(controller.surface().notifications.contains(&(
        "Bet placed! Waiting for result...".to_string(),
        Severity::Warning
    )));
}

#[tokio::test]
async fn place_wager__control_stays_disabled_until_confirmation() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_auto_confirm(false);
    let mut controller = ctx.connected_controller().await;

    // when
    place(&mut controller, GameKind::Dice, 4, "1");
    let settled = settle_within(&mut controller, Duration::from_millis(50)).await;

    // then
    assert!(!settled);
    assert_eq!(ctx.ledger.pending_count(), 1);
    assert!(!controller.view().dice.enabled);
    assert!(controller.view().coin.enabled);
    assert!(controller.place_wager(GameKind::Dice).is_err());

    // when
    ctx.ledger.confirm_next();
    controller.settle().await;

    // then
    assert!(controller.view().dice.enabled);
    assert_eq!(controller.history().len(), 1);
    assert_eq!(controller.surface().count("Dice bet placed successfully!"), 1);
}

#[tokio::test(start_paused = true)]
async fn place_wager__confirmation_timeout_reenables_control() {
    // given
    let mut ctx = TestContext::new();
    ctx.settings.confirmation_timeout = Some(Duration::from_secs(30));
    ctx.ledger.set_auto_confirm(false);
    let mut controller = ctx.connected_controller().await;

    // when
    place(&mut controller, GameKind::Coin, 0, "1");
    controller.settle().await;

    // then
    assert!(controller.view().coin.enabled);
    assert_eq!(controller.view().coin.prediction, Some(0));
    assert_eq!(
        controller.surface().last_notification(),
        Some(&(
            "Error placing bet: timed out waiting for transaction confirmation".to_string(),
            Severity::Error
        ))
    );
}

#[tokio::test]
async fn place_wager__insufficient_funds_is_reported_and_control_reenabled() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;

    // when
    place(&mut controller, GameKind::Coin, 1, "50");
    controller.settle().await;

    // then
    assert!(controller.view().coin.enabled);
    assert!(ctx.ledger.bet(1).is_none());
    assert_eq!(
        controller.surface().last_notification(),
        Some(&(
            "Error placing bet: insufficient funds for this wager".to_string(),
            Severity::Error
        ))
    );
}

#[tokio::test]
async fn place_wager__reverted_transaction_is_reported() {
    // given
    let ctx = TestContext::new();
    ctx.ledger.set_auto_confirm(false);
    let mut controller = ctx.connected_controller().await;
    place(&mut controller, GameKind::Dice, 6, "2");
    settle_within(&mut controller, Duration::from_millis(50)).await;

    // when
    assert!(ctx.ledger.revert_next("house is closed"));
    controller.settle().await;

    // then
    assert!(controller.view().dice.enabled);
    assert!(controller.history().is_empty());
    assert_eq!(
        controller.surface().last_notification(),
        Some(&(
            "Error placing bet: contract rejected the transaction: house is closed"
                .to_string(),
            Severity::Error
        ))
    );
}

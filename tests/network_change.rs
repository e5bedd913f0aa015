#![allow(non_snake_case)]
use wager_session::{
    SessionEvent,
    surface::{
        Severity,
        StatsView,
    },
    test_helpers::{
        TestContext,
        place,
    },
    types::GameKind,
    wallet::ConnectionState,
};

#[tokio::test]
async fn network_change__drops_session_and_reconnects_silently() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;
    place(&mut controller, GameKind::Coin, 0, "1");
    controller.settle().await;
    let prompts = ctx.wallet.prompt_count();

    // when
    ctx.wallet.switch_network(5);
    ctx.ledger.redeploy_here();
    controller.dispatch(SessionEvent::NetworkChanged);

    // then the old session is gone before anything is re-read
    assert_eq!(controller.state(), ConnectionState::Connecting);
    assert!(controller.history().is_empty());
    assert_eq!(ctx.ledger.listener_count(), 0);
    assert_eq!(controller.view().stats, StatsView::NotConnected);
    assert_eq!(
        controller.surface().last_notification(),
        Some(&("Network changed. Reconnecting...".to_string(), Severity::Warning))
    );

    // when
    controller.settle().await;

    // then
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(controller.account(), Some(&ctx.alice));
    assert_eq!(ctx.wallet.prompt_count(), prompts);
    assert_eq!(ctx.ledger.listener_count(), 2);
    assert_eq!(controller.history().len(), 1);
}

#[tokio::test]
async fn network_change__stays_disconnected_without_authorised_account() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;

    // when
    ctx.wallet.set_accounts(vec![]);
    ctx.wallet.switch_network(2);
    controller.dispatch(SessionEvent::NetworkChanged);
    controller.settle().await;

    // then
    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert_eq!(controller.account(), None);
    assert_eq!(ctx.ledger.listener_count(), 0);
}

#[tokio::test]
async fn network_change__contract_missing_on_new_network_leaves_stats_unavailable() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;

    // when
    ctx.wallet.switch_network(3);
    controller.dispatch(SessionEvent::NetworkChanged);
    controller.settle().await;

    // then
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(controller.view().stat_labels(), ["Unavailable"; 3].map(String::from));
    assert!(
        controller
            .surface()
            .messages()
            .iter()
            .any(|m| m.starts_with("Live bet updates unavailable"))
    );
}

#[tokio::test]
async fn network_change__while_disconnected_is_quiet() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.controller();
    controller.start();
    controller.settle().await;
    controller.surface_mut().clear();

    // when
    controller.dispatch(SessionEvent::NetworkChanged);
    controller.settle().await;

    // then
    assert_eq!(controller.state(), ConnectionState::Disconnected);
    assert!(controller.surface().notifications.is_empty());
}

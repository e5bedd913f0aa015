#![allow(non_snake_case)]
use wager_session::{
    Error,
    SessionEvent,
    UserAction,
    surface::Severity,
    test_helpers::{
        CONTRACT,
        TestContext,
    },
    wallet::ConnectionState,
};

#[tokio::test]
async fn update_contract_address__malformed_value_is_never_written() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.controller();
    controller.start();
    controller.settle().await;
    let saved = ctx.config.current();

    // when
    let result = controller.update_contract_address("0x1234");

    // then
    assert_eq!(
        result,
        Err(Error::validation("Please enter a valid contract address!"))
    );
    assert_eq!(ctx.config.write_count(), 0);
    assert_eq!(ctx.config.current(), saved);
    assert_eq!(controller.contract(), Some(ctx.contract));
    assert_eq!(
        controller.surface().last_notification(),
        Some(&(
            "Please enter a valid contract address!".to_string(),
            Severity::Error
        ))
    );
}

#[tokio::test]
async fn update_contract_address__blank_value_asks_for_an_address() {
    let ctx = TestContext::without_contract();
    let mut controller = ctx.controller();
    controller.start();

    let result = controller.update_contract_address("   ");

    assert_eq!(
        result,
        Err(Error::validation("Please enter a contract address!"))
    );
    assert_eq!(ctx.config.write_count(), 0);
}

#[tokio::test]
async fn update_contract_address__persists_and_enables_connecting() {
    // given
    let ctx = TestContext::without_contract();
    let mut controller = ctx.controller();
    controller.start();
    controller.settle().await;

    // when
    controller.dispatch(SessionEvent::User(UserAction::UpdateContractAddress(
        format!("  {CONTRACT}  "),
    )));
    controller.settle().await;

    // then
    assert_eq!(ctx.config.write_count(), 1);
    assert_eq!(
        ctx.config.current().contract_address.as_deref(),
        Some(CONTRACT)
    );
    assert_eq!(controller.contract(), Some(ctx.contract));
    assert!(
        controller
            .surface()
            .messages()
            .contains(&"Contract address updated! Now connect your wallet.")
    );
    assert_eq!(controller.state(), ConnectionState::Disconnected);

    // when
    controller.dispatch(SessionEvent::User(UserAction::Connect));
    controller.settle().await;

    // then
    assert_eq!(controller.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn update_contract_address__rebinds_a_connected_session() {
    // given
    let ctx = TestContext::new();
    let mut controller = ctx.connected_controller().await;

    // when
    controller
        .update_contract_address(&CONTRACT.to_lowercase())
        .unwrap();
    assert_eq!(controller.state(), ConnectionState::Connecting);
    controller.settle().await;

    // then
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(controller.account(), Some(&ctx.alice));
    assert_eq!(ctx.ledger.listener_count(), 2);
    assert_eq!(ctx.config.write_count(), 1);
}

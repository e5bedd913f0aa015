#![allow(non_snake_case)]
use std::time::Duration;
use wager_session::test_helpers::TestContext;

#[tokio::test(start_paused = true)]
async fn run__refreshes_stats_on_interval_and_stops_on_shutdown() {
    // given
    let ctx = TestContext::new();
    ctx.wallet.authorize();
    let period = ctx.settings.stats_refresh_interval;
    let controller = ctx.controller();
    let handle = controller.handle();
    let running = tokio::spawn(controller.run());
    // silent connect and the initial refresh finish before the clock moves
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(ctx.ledger.listener_count(), 2);
    let calls = ctx.ledger.call_count();

    // when
    tokio::time::sleep(period).await;

    // then
    assert_eq!(ctx.ledger.call_count(), calls + 3);

    // when
    assert!(handle.shutdown());
    running.await.unwrap();

    // then
    assert_eq!(ctx.ledger.listener_count(), 0);
    assert!(!handle.shutdown());
}

//! Awaiting wait tasks and unhandled errors from async tests.

mod common;

use common::fixtures::{AsyncLabel, Counter, FragileDispose, feed};
use rendertest::WaitFailureKind;
use rendertest::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn test_await_element_after_async_update() -> Result<()> {
    let (tx, feed) = feed();
    let ctx = TestContext::new()?;
    let cut = ctx.render::<AsyncLabel>(Parameters::new().add_object("Feed", feed))?;

    let task = cut.wait_for_element("p.done", Some(Duration::from_secs(10)));
    tx.send("ready".to_string()).expect("feed");

    let element = task.await?;
    assert_eq!(element.text_content()?, "ready");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_await_timeout() -> Result<()> {
    let ctx = TestContext::new()?;
    let cut = ctx.render::<Counter>(Parameters::new())?;

    let err = cut
        .wait_for_state(|| false, Some(Duration::from_millis(40)))
        .await
        .unwrap_err();

    let failed = err.as_wait_failed().expect("wait failure");
    assert_eq!(failed.kind, WaitFailureKind::Timeout);
    Ok(())
}

#[tokio::test]
async fn test_dropping_the_future_disposes_the_wait() -> Result<()> {
    let ctx = TestContext::new()?;
    let cut = ctx.render::<Counter>(Parameters::new())?;

    let pending = cut.wait_for_state(|| false, Some(Duration::from_secs(10)));
    let raced = tokio::time::timeout(Duration::from_millis(20), pending).await;

    assert!(raced.is_err());
    assert_eq!(ctx.dispatcher().observer_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_await_unhandled_error() -> Result<()> {
    let (tx, feed) = feed();
    let ctx = TestContext::new()?;
    let _cut = ctx.render::<AsyncLabel>(Parameters::new().add_object("Feed", feed))?;

    tx.send("FAIL".to_string()).expect("feed");

    let err = tokio::time::timeout(Duration::from_secs(10), ctx.renderer().unhandled_error())
        .await
        .expect("error before timeout")
        .expect("renderer still running");
    assert!(err.to_string().contains("update failed"));
    Ok(())
}

#[tokio::test]
async fn test_teardown_dispose_panic_is_reported() -> Result<()> {
    let ctx = TestContext::new()?;
    let _cut = ctx.render::<FragileDispose>(Parameters::new())?;
    let pending = ctx.renderer().unhandled_error();

    drop(ctx);

    let err = tokio::time::timeout(Duration::from_secs(10), pending)
        .await
        .expect("error before timeout")
        .expect("teardown error delivered");
    assert!(matches!(err, Error::Panicked(ref message) if message.contains("dispose exploded")));
    Ok(())
}

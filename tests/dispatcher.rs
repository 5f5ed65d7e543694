//! Dispatcher ordering, reentrancy and teardown through the public API.

mod common;

use common::fixtures::Counter;
use rendertest::prelude::*;
use rendertest::{TestContextOptions, TestRenderer};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_jobs_run_on_the_named_dispatch_thread() -> Result<()> {
    let renderer = TestRenderer::new(TestContextOptions::default().with_thread_name("ui-under-test"))?;

    let name = renderer
        .dispatcher()
        .invoke(|_| Ok(thread::current().name().map(str::to_string)))?;

    assert_eq!(name.as_deref(), Some("ui-under-test"));
    assert!(!renderer.dispatcher().is_dispatch_thread());
    Ok(())
}

#[test]
fn test_invokes_from_many_threads_are_serialized() -> Result<()> {
    let renderer = TestRenderer::new(TestContextOptions::default())?;
    let log = Arc::new(Mutex::new(Vec::new()));

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let dispatcher = renderer.dispatcher().clone();
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for step in 0..25 {
                    let log = Arc::clone(&log);
                    dispatcher
                        .invoke(move |_| {
                            log.lock().unwrap().push((worker, step));
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 100);
    for worker in 0..4 {
        let steps: Vec<_> = log.iter().filter(|(w, _)| *w == worker).map(|(_, s)| *s).collect();
        assert_eq!(steps, (0..25).collect::<Vec<_>>());
    }
    Ok(())
}

#[test]
fn test_posted_job_cannot_block_on_the_dispatcher() -> Result<()> {
    let renderer = TestRenderer::new(TestContextOptions::default())?;
    let (tx, rx) = mpsc::channel();

    renderer.dispatcher().post(move |tree| {
        let nested = tree.dispatcher().invoke(|_| Ok(()));
        tx.send(matches!(nested, Err(Error::ReentrantDispatch))).unwrap();
        Ok(())
    })?;

    assert!(rx.recv_timeout(Duration::from_secs(10)).unwrap());
    Ok(())
}

#[test]
fn test_handle_requests_rerender() -> Result<()> {
    let ctx = TestContext::new()?;
    let cut = ctx.render::<Counter>(Parameters::new())?;
    let handle = cut.handle();

    handle.invoke(|counter, _| {
        counter.count = 3;
        Ok(())
    })?;
    handle.state_has_changed()?;

    cut.wait_for_state(
        {
            let cut = cut.clone();
            move || cut.render_count() == 2
        },
        Some(Duration::from_secs(10)),
    )
    .wait()?;
    assert_eq!(cut.find("p")?.text_content()?, "Current count: 3");
    Ok(())
}

#[test]
fn test_handle_fails_after_teardown() -> Result<()> {
    let ctx = TestContext::new()?;
    let cut = ctx.render::<Counter>(Parameters::new())?;
    let handle = cut.handle();
    drop(ctx);

    assert!(matches!(handle.state_has_changed(), Err(Error::RendererDisposed)));
    assert!(matches!(
        cut.invoke(|_, _| Ok(())),
        Err(Error::RendererDisposed)
    ));
    assert!(cut.is_disposed());
    Ok(())
}

#[test]
fn test_handle_ignores_disposed_component() -> Result<()> {
    let ctx = TestContext::new()?;
    let cut = ctx.render::<Counter>(Parameters::new())?;
    let handle = cut.handle();
    ctx.dispose_components()?;

    handle.invoke(|counter, _| {
        counter.count = 99;
        Ok(())
    })?;
    ctx.dispatcher().invoke(|_| Ok(()))?;

    assert!(ctx.renderer().take_unhandled_error().is_none());
    Ok(())
}

#[test]
fn test_concurrent_clicks_are_counted_exactly() -> Result<()> {
    let ctx = TestContext::new()?;
    let cut = ctx.render::<Counter>(Parameters::new())?;

    let clickers: Vec<_> = (0..4)
        .map(|_| {
            let button = cut.find("button").unwrap();
            thread::spawn(move || {
                for _ in 0..25 {
                    button.click().unwrap();
                }
            })
        })
        .collect();
    for clicker in clickers {
        clicker.join().unwrap();
    }

    assert_eq!(cut.instance(|c| c.count)?, 100);
    assert_eq!(cut.render_count(), 101);
    Ok(())
}

#[test]
fn test_total_render_count_spans_components() -> Result<()> {
    let ctx = TestContext::new()?;
    let a = ctx.render::<Counter>(Parameters::new())?;
    let b = ctx.render::<Counter>(Parameters::new())?;
    a.find("button")?.click()?;
    b.find("button")?.click()?;

    assert_eq!(ctx.renderer().total_render_count(), 4);
    Ok(())
}

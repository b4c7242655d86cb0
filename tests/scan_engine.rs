// tests/scan_engine.rs
mod common;

use common::{engine_builder, instrument, replay, ScriptedSource};
use first_candle_scanner::domain::errors::ScanError;
use first_candle_scanner::domain::models::ResultSet;
use first_candle_scanner::domain::settings::Settings;
use first_candle_scanner::engine::ScanEngine;
use first_candle_scanner::scanner::orchestrator::ScannerOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn universe() -> Vec<first_candle_scanner::exchange::replay::InstrumentSnapshot> {
    vec![
        instrument("AAA", 500_000, true),
        instrument("BBB", 50_000, true),
        instrument("CCC", 400_000, false),
        instrument("DDD", 300_000, true),
    ]
}

async fn connected_engine(source: Arc<ScriptedSource>) -> ScanEngine {
    let engine = engine_builder(source).build();
    engine.connect().await.unwrap();
    engine
}

fn sorted_symbols(results: &ResultSet) -> Vec<String> {
    let mut symbols: Vec<String> = results.keys().cloned().collect();
    symbols.sort();
    symbols
}

#[tokio::test]
async fn scan_publishes_only_qualifying_instruments() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source).await;

    let results = engine.run_scan().await.unwrap();

    assert_eq!(sorted_symbols(&results), ["AAA", "DDD"]);
    assert_eq!(engine.live_results(), results);

    let aaa = &results["AAA"];
    assert!(aaa.normal_bullish);
    assert!(aaa.ha_bullish);
    assert_eq!(aaa.first_candle_volume, 500_000);
    assert_eq!(aaa.last_price, 11.5);
    assert_eq!(aaa.market_cap, 5e9);
    assert_eq!(aaa.parameters_used, Settings::default().describe());
    assert_eq!(aaa.scan_time, common::scan_time());
}

#[tokio::test]
async fn repeated_scan_archives_previous_set_once() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source).await;

    let first = engine.run_scan().await.unwrap();
    assert!(engine.previous_runs(10).is_empty());

    let second = engine.run_scan().await.unwrap();
    assert_eq!(sorted_symbols(&first), sorted_symbols(&second));

    let history = engine.previous_runs(10);
    assert_eq!(history.len(), 1);
    assert_eq!(sorted_symbols(&history[0].results), ["AAA", "DDD"]);
    assert_eq!(history[0].parameters, Settings::default().describe());
}

#[tokio::test]
async fn empty_live_set_is_not_archived() {
    let source = Arc::new(ScriptedSource::new(replay(vec![instrument("BBB", 50_000, true)])));
    let engine = connected_engine(source).await;

    assert!(engine.run_scan().await.unwrap().is_empty());
    assert!(engine.run_scan().await.unwrap().is_empty());
    assert!(engine.previous_runs(10).is_empty());
}

#[tokio::test]
async fn scan_requires_connection() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = engine_builder(source.clone()).build();

    assert!(matches!(engine.run_scan().await, Err(ScanError::NotConnected)));
    assert_eq!(source.universe_calls(), 0);
    assert!(engine.live_results().is_empty());
}

#[tokio::test]
async fn universe_failure_keeps_last_known_good_state() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source.clone()).await;

    let good = engine.run_scan().await.unwrap();

    source.fail_universe.store(true, Ordering::SeqCst);
    assert!(matches!(engine.run_scan().await, Err(ScanError::Universe(_))));

    assert_eq!(engine.live_results(), good);
    assert!(engine.previous_runs(10).is_empty());
}

#[tokio::test]
async fn quote_failure_drops_only_that_instrument() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    source.fail_quote("DDD");
    let engine = connected_engine(source).await;

    let results = engine.run_scan().await.unwrap();
    assert_eq!(sorted_symbols(&results), ["AAA"]);
}

#[tokio::test]
async fn missing_fundamentals_default_market_cap_to_zero() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    source.fail_fundamentals("AAA");
    let engine = connected_engine(source).await;

    let results = engine.run_scan().await.unwrap();
    assert_eq!(results["AAA"].market_cap, 0.0);
    assert_eq!(results["DDD"].market_cap, 5e9);
}

#[tokio::test]
async fn slow_instrument_is_abandoned_after_timeout() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    source.delay_bars("AAA", Duration::from_secs(5));

    let engine = engine_builder(source.clone())
        .options(ScannerOptions {
            instrument_timeout: Duration::from_millis(100),
            ..ScannerOptions::default()
        })
        .build();
    engine.connect().await.unwrap();

    let results = tokio::time::timeout(Duration::from_secs(2), engine.run_scan())
        .await
        .expect("scan must not wait for the slow instrument")
        .unwrap();

    assert_eq!(sorted_symbols(&results), ["DDD"]);
}

#[tokio::test]
async fn subscriber_sees_each_completed_scan() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source.clone()).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let calls = calls.clone();
        let seen = seen.clone();
        engine.set_subscriber(Arc::new(move |results: &ResultSet| {
            calls.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(results.len());
        }));
    }

    engine.run_scan().await.unwrap();
    engine.run_scan().await.unwrap();

    source.fail_universe.store(true, Ordering::SeqCst);
    let _ = engine.run_scan().await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*seen.lock().unwrap(), [2, 2]);

    engine.clear_subscriber();
    source.fail_universe.store(false, Ordering::SeqCst);
    engine.run_scan().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn updated_settings_apply_to_next_scan() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source).await;

    engine.run_scan().await.unwrap();

    let stricter = engine
        .settings()
        .to_builder()
        .min_volume(450_000)
        .build()
        .unwrap();
    engine.update_settings(stricter.clone());
    assert_eq!(*engine.settings(), stricter);

    let results = engine.run_scan().await.unwrap();
    assert_eq!(sorted_symbols(&results), ["AAA"]);
    assert_eq!(results["AAA"].parameters_used, stricter.describe());

    // The archived run is tagged with the settings active when it was replaced.
    let history = engine.previous_runs(1);
    assert_eq!(history[0].parameters, stricter.describe());
}

#[tokio::test]
async fn in_flight_scan_keeps_its_settings_snapshot() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    source.set_universe_delay(Duration::from_millis(200));
    let engine = Arc::new(connected_engine(source.clone()).await);
    let original = engine.settings();

    let scan = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_scan().await })
    };

    // Replace settings while the scan waits on the universe.
    while source.universe_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let stricter = original.to_builder().min_volume(450_000).build().unwrap();
    engine.update_settings(stricter.clone());

    let results = scan.await.unwrap().unwrap();
    assert_eq!(sorted_symbols(&results), ["AAA", "DDD"]);
    assert!(results
        .values()
        .all(|r| r.parameters_used == original.describe()));

    let next = engine.run_scan().await.unwrap();
    assert_eq!(sorted_symbols(&next), ["AAA"]);
    assert_eq!(next["AAA"].parameters_used, stricter.describe());
}

#[tokio::test]
async fn normal_only_detection_ignores_smoothed_candle() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source).await;

    let settings = Settings::builder()
        .detect_ha_candle(false)
        .detect_normal_candle(true)
        .build()
        .unwrap();
    engine.update_settings(settings);

    let results = engine.run_scan().await.unwrap();
    assert_eq!(sorted_symbols(&results), ["AAA", "DDD"]);
    assert!(results.values().all(|r| !r.ha_bullish && r.normal_bullish));
}

#[tokio::test]
async fn disabling_both_detectors_yields_no_results() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source).await;

    let settings = Settings::builder()
        .detect_ha_candle(false)
        .detect_normal_candle(false)
        .build()
        .unwrap();
    engine.update_settings(settings);

    assert!(engine.run_scan().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_scans_are_serialised() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    source.set_universe_delay(Duration::from_millis(50));
    let engine = Arc::new(connected_engine(source.clone()).await);

    let scans: Vec<_> = (0..3)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.run_scan().await })
        })
        .collect();

    for scan in scans {
        assert_eq!(scan.await.unwrap().unwrap().len(), 2);
    }

    assert_eq!(source.universe_calls(), 3);
    assert_eq!(source.max_in_flight_universe.load(Ordering::SeqCst), 1);
    assert_eq!(engine.previous_runs(10).len(), 2);
}

#[tokio::test]
async fn history_is_capped_at_capacity() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = engine_builder(source).history_capacity(2).build();
    engine.connect().await.unwrap();

    for _ in 0..5 {
        engine.run_scan().await.unwrap();
    }

    assert_eq!(engine.previous_runs(10).len(), 2);
    assert_eq!(engine.session().history_capacity(), 2);
}

#[tokio::test]
async fn disconnect_blocks_further_scans() {
    let source = Arc::new(ScriptedSource::new(replay(universe())));
    let engine = connected_engine(source).await;
    assert!(engine.is_connected());

    engine.disconnect().await.unwrap();
    assert!(!engine.is_connected());
    assert!(matches!(engine.run_scan().await, Err(ScanError::NotConnected)));
}

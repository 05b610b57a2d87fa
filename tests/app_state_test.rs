//! Gating, error and validation behaviour of the session state

use std::time::{Duration, Instant};

use alloy_primitives::U256;
use tokenboard::app::{App, ERROR_BANNER};
use tokenboard::domain::{ReadResult, INVALID_ADDRESS_MESSAGE};

const ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

fn addr(fill: char) -> String {
    format!("0x{}", fill.to_string().repeat(40))
}

fn connect(app: &mut App) {
    app.apply_wallet_connected("Node accounts".to_string(), ACCOUNT.to_string());
}

#[test]
fn test_disconnected_never_dispatches() {
    let mut app = App::default();
    app.add_address(&addr('a')).unwrap();
    app.add_address(&addr('b')).unwrap();

    let t0 = Instant::now();
    for step in 0..30u64 {
        app.on_tick(t0 + Duration::from_secs(step * 3));
        assert!(app.take_read_request().is_none());
    }
    assert_eq!(app.scheduler.dispatched(), 0);
}

#[test]
fn test_empty_list_never_dispatches() {
    let mut app = App::default();
    connect(&mut app);
    app.on_tick(Instant::now());
    assert!(app.take_read_request().is_none());
}

#[test]
fn test_duplicate_and_malformed_share_alert() {
    let mut app = App::default();
    app.address_input = addr('a');
    assert!(app.submit_address());

    app.address_input = addr('a');
    assert!(!app.submit_address());
    assert_eq!(app.watchlist.len(), 1);
    assert_eq!(app.alert.as_deref(), Some(INVALID_ADDRESS_MESSAGE));
    // Rejected input stays in the box for editing
    assert_eq!(app.address_input, addr('a'));

    app.dismiss_alert();
    app.address_input = "0x1234".to_string();
    assert!(!app.submit_address());
    assert_eq!(app.alert.as_deref(), Some(INVALID_ADDRESS_MESSAGE));
}

#[test]
fn test_stale_while_error() {
    let mut app = App::default();
    connect(&mut app);
    app.add_address(&addr('a')).unwrap();

    let t0 = Instant::now();
    app.on_tick(t0);
    let first = app.take_read_request().unwrap();
    app.apply_batch_resolved(
        first.id,
        vec![
            ReadResult::Value(U256::from(42u64)),
            ReadResult::Value(U256::from(100u64)),
        ],
    );

    app.on_tick(t0 + Duration::from_secs(10));
    let second = app.take_read_request().unwrap();
    assert!(app.apply_batch_failed(second.id, "connection refused".to_string()));

    assert!(app.is_error);
    assert_eq!(ERROR_BANNER, "Error fetching contract data");
    assert_eq!(app.card_values(0).balance.display(), "42");
    assert_eq!(app.card_values(0).total_supply.display(), "100");

    // A later success clears the flag
    app.on_tick(t0 + Duration::from_secs(20));
    let third = app.take_read_request().unwrap();
    app.apply_batch_resolved(third.id, vec![ReadResult::Absent; 2]);
    assert!(!app.is_error);
    assert_eq!(app.card_values(0).balance.display(), "N/A");
}

#[test]
fn test_no_overlapping_batches() {
    let mut app = App::default();
    connect(&mut app);
    app.add_address(&addr('a')).unwrap();

    let t0 = Instant::now();
    app.on_tick(t0);
    let first = app.take_read_request().unwrap();

    app.refresh();
    app.add_address(&addr('b')).unwrap();
    for step in 1..5u64 {
        app.on_tick(t0 + Duration::from_secs(step * 10));
        assert!(app.take_read_request().is_none());
    }

    app.apply_batch_resolved(first.id, vec![ReadResult::Value(U256::from(7u64)); 2]);
    app.on_tick(t0 + Duration::from_secs(60));
    let second = app.take_read_request().unwrap();
    assert_eq!(second.plan.len(), 4);
}

#[test]
fn test_stale_result_is_ignored() {
    let mut app = App::default();
    connect(&mut app);
    app.add_address(&addr('a')).unwrap();
    app.on_tick(Instant::now());
    let dispatch = app.take_read_request().unwrap();

    assert!(!app.apply_batch_resolved(dispatch.id + 1, vec![ReadResult::Absent; 2]));
    assert!(!app.apply_batch_failed(dispatch.id + 1, "late".to_string()));
    assert!(app.snapshot.is_none());
    assert!(!app.is_error);
}

#[test]
fn test_results_follow_addresses_across_edits() {
    let mut app = App::default();
    connect(&mut app);
    app.add_address(&addr('a')).unwrap();
    app.add_address(&addr('b')).unwrap();
    app.on_tick(Instant::now());
    let dispatch = app.take_read_request().unwrap();

    // `a` is removed while the batch is out
    app.remove_at(0);
    app.apply_batch_resolved(
        dispatch.id,
        vec![
            ReadResult::Value(U256::from(1u64)),
            ReadResult::Value(U256::from(2u64)),
            ReadResult::Value(U256::from(3u64)),
            ReadResult::Value(U256::from(4u64)),
        ],
    );
    let cards = app.cards();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].title, "Contract 1");
    assert_eq!(cards[0].values.balance.display(), "3");
    assert_eq!(cards[0].values.total_supply.display(), "4");
}

#[test]
fn test_disconnect_stops_polling_and_ignores_identity() {
    let mut app = App::default();
    connect(&mut app);
    app.add_address(&addr('a')).unwrap();

    let t0 = Instant::now();
    app.on_tick(t0);
    let dispatch = app.take_read_request().unwrap();
    app.apply_batch_resolved(dispatch.id, vec![ReadResult::Value(U256::from(5u64)); 2]);

    app.disconnect();
    assert!(app.take_disconnect_request());
    app.apply_identity(ACCOUNT.to_string(), Some("late.eth".to_string()), None);
    assert!(app.gate.identity().is_none());

    for step in 1..5u64 {
        app.on_tick(t0 + Duration::from_secs(step * 10));
        assert!(app.take_read_request().is_none());
    }
    // Previous results are kept
    assert_eq!(app.card_values(0).balance.display(), "5");

    // Reconnecting polls right away
    connect(&mut app);
    app.on_tick(t0 + Duration::from_secs(51));
    assert!(app.take_read_request().is_some());
}

#[test]
fn test_worker_reported_disconnect() {
    let mut app = App::default();
    connect(&mut app);
    app.apply_wallet_disconnected("Account no longer available".to_string());
    assert!(!app.is_connected());
    assert!(!app.take_disconnect_request());
}

#[test]
fn test_failed_connect_stays_disconnected() {
    let mut app = App::default();
    app.activate_connector(0);
    let connector = app.take_connect_request().unwrap();
    app.apply_wallet_connect_failed(connector.name, "Node exposes no accounts".to_string());
    assert!(!app.is_connected());
    assert!(app.connecting.is_none());
    let (text, _) = app.status_text().unwrap();
    assert!(text.contains("Node exposes no accounts"));
}

#[test]
fn test_worker_stop_releases_in_flight_batch() {
    let mut app = App::default();
    connect(&mut app);
    app.add_address(&addr('a')).unwrap();

    let t0 = Instant::now();
    app.on_tick(t0);
    let dispatch = app.take_read_request().unwrap();
    assert!(app.scheduler.is_in_flight());

    app.apply_worker_stopped("RPC worker stopped".to_string());
    assert!(!app.scheduler.is_in_flight());
    assert!(app.is_error);
    assert_eq!(app.last_error.as_deref(), Some("RPC worker stopped"));

    // The abandoned ticket cannot land later
    assert!(!app.apply_batch_resolved(dispatch.id, vec![ReadResult::Absent; 2]));

    // Polling carries on; each attempt now fails at the send
    app.on_tick(t0 + Duration::from_secs(10));
    assert!(app.take_read_request().is_some());
}

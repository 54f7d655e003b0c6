//! Unit tests for sequence-numbered snapshot publication.

use aw_supervisor::models::snapshot::StatusSnapshot;
use aw_supervisor::status::StatusBoard;

fn tracking() -> StatusSnapshot {
    StatusSnapshot {
        server_reachable: true,
        tracking_active: true,
        afk_recent: true,
        window_recent: true,
        ..StatusSnapshot::default()
    }
}

#[test]
fn starts_empty() {
    let board = StatusBoard::new();
    assert!(board.latest().is_none());
}

#[test]
fn sequence_numbers_increase() {
    let board = StatusBoard::new();
    let first = board.begin_poll();
    let second = board.begin_poll();
    assert!(second > first);
}

#[test]
fn in_order_results_are_published() {
    let board = StatusBoard::new();
    let first = board.begin_poll();
    assert!(board.publish(first, StatusSnapshot::offline()));
    let second = board.begin_poll();
    assert!(board.publish(second, tracking()));

    let latest = board.latest().expect("published");
    assert_eq!(latest.seq, second);
    assert_eq!(latest.snapshot, tracking());
}

#[test]
fn slower_earlier_poll_is_dropped() {
    let board = StatusBoard::new();
    let slow = board.begin_poll();
    let fast = board.begin_poll();

    assert!(board.publish(fast, tracking()));
    assert!(!board.publish(slow, StatusSnapshot::offline()));

    let latest = board.latest().expect("published");
    assert_eq!(latest.seq, fast);
    assert_eq!(latest.snapshot, tracking());
}

#[test]
fn same_sequence_is_not_published_twice() {
    let board = StatusBoard::new();
    let seq = board.begin_poll();
    assert!(board.publish(seq, tracking()));
    assert!(!board.publish(seq, StatusSnapshot::offline()));
}

#[tokio::test]
async fn subscribers_see_accepted_results_only() {
    let board = StatusBoard::new();
    let mut rx = board.subscribe();

    let slow = board.begin_poll();
    let fast = board.begin_poll();
    board.publish(fast, tracking());
    rx.changed().await.expect("sender alive");
    let seen = rx.borrow_and_update().as_ref().map(|p| p.seq);
    assert_eq!(seen, Some(fast));

    board.publish(slow, StatusSnapshot::offline());
    assert!(!rx.has_changed().expect("sender alive"));
}

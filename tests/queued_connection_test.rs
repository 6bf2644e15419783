//! Typewriter-paced connection tests. Time is paused, so pacing is exact.

mod support;

use chatstream::ChatError;
use chatstream::streaming::{
    ConnectionStatus, EventReceiver, QueuedStreamConnection, StreamEvent,
};
use chatstream::types::ChatTarget;
use std::sync::Arc;
use std::time::Duration;
use support::{ScriptedTransport, assert_quiet, chunks_text, paced_config};
use tokio::time::Instant;

const TICK: Duration = Duration::from_millis(50);
const QUIET: Duration = Duration::from_secs(1);

fn connection(
    transport: &ScriptedTransport,
    batch_chars: usize,
) -> (QueuedStreamConnection, EventReceiver) {
    QueuedStreamConnection::new(paced_config(TICK, batch_chars), Arc::new(transport.clone()))
}

async fn next(events: &mut EventReceiver) -> StreamEvent {
    events.recv().await.expect("event")
}

async fn expect_connected(events: &mut EventReceiver) {
    assert_eq!(next(events).await, StreamEvent::Status(ConnectionStatus::Connecting));
    assert_eq!(next(events).await, StreamEvent::Status(ConnectionStatus::Connected));
}

#[tokio::test(start_paused = true)]
async fn reveals_one_batch_per_tick() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.chunk("abc");

    let (conn, mut events) = connection(&transport, 1);
    let started = Instant::now();
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    expect_connected(&mut events).await;

    let mut stamps = Vec::new();
    for expected in ["a", "b", "c"] {
        assert_eq!(next(&mut events).await, StreamEvent::Chunk(expected.into()));
        stamps.push(started.elapsed());
    }
    assert!(stamps[0] >= TICK);
    assert!(stamps[2] >= TICK * 3);
    assert!(stamps.windows(2).all(|w| w[1] - w[0] >= TICK));
    assert_eq!(conn.current_content(), "abc");

    feed.done();
    assert_eq!(next(&mut events).await, StreamEvent::Complete("abc".into()));
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Disconnected)
    );
    assert!(!conn.is_active());
}

#[tokio::test(start_paused = true)]
async fn batch_size_controls_characters_per_tick() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.chunk("abcdefg");

    let (conn, mut events) = connection(&transport, 3);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    expect_connected(&mut events).await;

    for expected in ["abc", "def", "g"] {
        assert_eq!(next(&mut events).await, StreamEvent::Chunk(expected.into()));
    }
    drop(feed);
    assert_eq!(next(&mut events).await, StreamEvent::Complete("abcdefg".into()));
}

#[tokio::test(start_paused = true)]
async fn natural_end_flushes_the_queue_before_completing() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.chunk("hello");
    feed.chunk(" world");
    feed.done();

    let (conn, mut events) = connection(&transport, 1);
    let started = Instant::now();
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    expect_connected(&mut events).await;

    let turn = events.collect_turn().await;
    assert_eq!(turn.last(), Some(&StreamEvent::Complete("hello world".into())));
    assert_eq!(chunks_text(&turn), "hello world");
    // Nothing waited for the timer.
    assert!(started.elapsed() < TICK);
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Disconnected)
    );
    assert_quiet(&mut events, QUIET).await;
}

#[tokio::test(start_paused = true)]
async fn chunks_arriving_mid_drain_keep_their_order() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.chunk("ab");

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    expect_connected(&mut events).await;

    assert_eq!(next(&mut events).await, StreamEvent::Chunk("a".into()));
    feed.chunk("cd");
    assert_eq!(next(&mut events).await, StreamEvent::Chunk("b".into()));
    assert_eq!(next(&mut events).await, StreamEvent::Chunk("c".into()));
    feed.done();

    let rest = events.collect_turn().await;
    assert_eq!(
        rest,
        vec![
            StreamEvent::Chunk("d".into()),
            StreamEvent::Complete("abcd".into()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn explicit_close_drops_unrevealed_text() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.chunk("hello");

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    expect_connected(&mut events).await;
    assert_eq!(next(&mut events).await, StreamEvent::Chunk("h".into()));

    conn.close_connection();
    feed.chunk("more");
    feed.done();

    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Disconnected)
    );
    assert_quiet(&mut events, QUIET).await;
    assert_eq!(conn.current_content(), "h");

    // Second close has nothing to report.
    conn.close_connection();
    assert_quiet(&mut events, QUIET).await;
}

#[tokio::test(start_paused = true)]
async fn restart_discards_the_previous_queue() {
    let transport = ScriptedTransport::new();
    let old_feed = transport.push_stream();
    let new_feed = transport.push_stream();
    old_feed.chunk("stale text");

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "first").await.unwrap();
    expect_connected(&mut events).await;
    assert_eq!(next(&mut events).await, StreamEvent::Chunk("s".into()));

    conn.start_connection(&ChatTarget::new("s-1"), "second").await.unwrap();
    old_feed.chunk("late");
    old_feed.done();
    new_feed.chunk("new");
    new_feed.done();

    expect_connected(&mut events).await;
    let turn = events.collect_turn().await;
    assert_eq!(
        turn,
        vec![
            StreamEvent::Chunk("new".into()),
            StreamEvent::Complete("new".into()),
        ]
    );
    assert_eq!(conn.current_content(), "new");
}

#[tokio::test(start_paused = true)]
async fn mid_stream_error_reports_error_status() {
    let transport = ScriptedTransport::new();
    let feed = transport.push_stream();
    feed.chunk("queued");
    feed.fail(ChatError::StreamError("connection reset".into()));

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    expect_connected(&mut events).await;

    assert!(matches!(
        next(&mut events).await,
        StreamEvent::Error(ChatError::StreamError(_))
    ));
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Error)
    );
    assert_quiet(&mut events, QUIET).await;
    assert!(!conn.is_active());
}

#[tokio::test(start_paused = true)]
async fn open_failure_reports_error_status() {
    let transport = ScriptedTransport::new();
    transport.push_failure(ChatError::ConnectionError("refused".into()));

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();

    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Connecting)
    );
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Error(ChatError::ConnectionError("refused".into()))
    );
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Error)
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_target_reports_error_status_and_err() {
    let transport = ScriptedTransport::new();
    let (conn, mut events) = connection(&transport, 1);

    let err = conn
        .start_connection(&ChatTarget::new("  "), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::InvalidInput(_)));
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Connecting)
    );
    assert_eq!(
        next(&mut events).await,
        StreamEvent::Status(ConnectionStatus::Error)
    );
    assert!(!conn.is_active());
}

/// Let the consumer task run until the turn has ended on its own.
async fn wait_until_finished(conn: &QueuedStreamConnection) {
    for _ in 0..1000 {
        if !conn.is_active() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("turn did not finish");
}

fn finished_turn(transport: &ScriptedTransport, text: &str) {
    let feed = transport.push_stream();
    feed.chunk(text);
    feed.done();
}

async fn expect_finished_turn(events: &mut EventReceiver, text: &str) {
    expect_connected(events).await;
    assert_eq!(
        events.collect_turn().await,
        vec![
            StreamEvent::Chunk(text.into()),
            StreamEvent::Complete(text.into()),
        ]
    );
    assert_eq!(
        next(events).await,
        StreamEvent::Status(ConnectionStatus::Disconnected)
    );
}

#[tokio::test(start_paused = true)]
async fn unread_events_of_a_finished_turn_survive_a_restart() {
    let transport = ScriptedTransport::new();
    finished_turn(&transport, "answer one");
    finished_turn(&transport, "answer two");

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "first").await.unwrap();
    wait_until_finished(&conn).await;
    conn.start_connection(&ChatTarget::new("s-1"), "second").await.unwrap();

    expect_finished_turn(&mut events, "answer one").await;
    expect_finished_turn(&mut events, "answer two").await;
    assert_quiet(&mut events, QUIET).await;
}

#[tokio::test(start_paused = true)]
async fn close_after_completion_changes_nothing() {
    let transport = ScriptedTransport::new();
    finished_turn(&transport, "answer one");

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    wait_until_finished(&conn).await;
    conn.close_connection();
    conn.close_connection();

    expect_finished_turn(&mut events, "answer one").await;
    assert_eq!(conn.current_content(), "answer one");
    assert_quiet(&mut events, QUIET).await;
}

#[tokio::test(start_paused = true)]
async fn dropping_after_completion_still_delivers_the_turn() {
    let transport = ScriptedTransport::new();
    finished_turn(&transport, "answer one");

    let (conn, mut events) = connection(&transport, 1);
    conn.start_connection(&ChatTarget::new("s-1"), "hi").await.unwrap();
    wait_until_finished(&conn).await;
    drop(conn);

    expect_finished_turn(&mut events, "answer one").await;
    assert_eq!(events.recv().await, None);
}

//! Unit tests for the control channel line queue.
//!
//! Lines must come out in arrival order whether they arrive before the
//! read, after it, or interleaved with reads.

use std::time::Duration;

use session_relay::protocol::channel::LineQueue;
use session_relay::AppError;

fn line(i: usize) -> String {
    format!("line-{i}")
}

async fn next(queue: &LineQueue) -> Option<String> {
    queue
        .next_line()
        .await
        .map(|line| line.expect("queued line, not an error"))
}

#[tokio::test]
async fn lines_arriving_before_reads_are_buffered_in_order() {
    let queue = LineQueue::new();
    for i in 0..3 {
        queue.push_line(line(i));
    }
    assert_eq!(queue.buffered(), 3);

    for i in 0..3 {
        assert_eq!(next(&queue).await, Some(line(i)));
    }
    assert_eq!(queue.buffered(), 0);
}

#[tokio::test]
async fn reader_waiting_before_line_receives_it() {
    let queue = LineQueue::new();
    let reader = {
        let queue = queue.clone();
        tokio::spawn(async move { next(&queue).await })
    };

    // Let the reader park before the line arrives.
    tokio::task::yield_now().await;
    queue.push_line(line(0));

    let received = reader.await.expect("reader task");
    assert_eq!(received, Some(line(0)));
    assert_eq!(queue.buffered(), 0, "line must go to the waiter, not the buffer");
}

#[tokio::test]
async fn mixed_ordering_preserves_arrival_order() {
    let queue = LineQueue::new();
    let reader = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(line) = next(&queue).await {
                seen.push(line);
            }
            seen
        })
    };

    // Alternate between bursts pushed while the reader is parked and
    // bursts pushed while it is still busy with earlier lines.
    let mut next = 0;
    for burst in [1usize, 3, 2, 1, 4] {
        tokio::task::yield_now().await;
        for _ in 0..burst {
            queue.push_line(line(next));
            next += 1;
        }
    }
    queue.close();

    let seen = reader.await.expect("reader task");
    let expected: Vec<String> = (0..next).map(line).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn close_releases_waiting_reader_with_none() {
    let queue = LineQueue::new();
    let reader = {
        let queue = queue.clone();
        tokio::spawn(async move { next(&queue).await })
    };

    tokio::task::yield_now().await;
    queue.close();

    let received = tokio::time::timeout(Duration::from_secs(1), reader)
        .await
        .expect("reader must be released by close")
        .expect("reader task");
    assert_eq!(received, None);
}

#[tokio::test]
async fn buffered_lines_remain_readable_after_close() {
    let queue = LineQueue::new();
    queue.push_line(line(0));
    queue.push_line(line(1));
    queue.close();

    assert_eq!(next(&queue).await, Some(line(0)));
    assert_eq!(next(&queue).await, Some(line(1)));
    assert_eq!(next(&queue).await, None);
}

#[tokio::test]
async fn lines_pushed_after_close_are_dropped() {
    let queue = LineQueue::new();
    queue.close();
    queue.push_line(line(0));

    assert_eq!(queue.buffered(), 0);
    assert_eq!(next(&queue).await, None);
}

#[tokio::test]
async fn abandoned_read_does_not_swallow_the_next_line() {
    let queue = LineQueue::new();

    let timed_out = tokio::time::timeout(Duration::from_millis(10), queue.next_line()).await;
    assert!(timed_out.is_err(), "no line yet, read must time out");

    queue.push_line(line(0));
    assert_eq!(next(&queue).await, Some(line(0)));
}

#[tokio::test]
async fn errors_keep_their_place_between_lines() {
    let queue = LineQueue::new();
    queue.push_line(line(0));
    queue.push_error(AppError::Protocol("line too long".into()));
    queue.push_line(line(1));
    queue.close();

    assert_eq!(next(&queue).await, Some(line(0)));
    let err = queue
        .next_line()
        .await
        .expect("error entry")
        .expect_err("rejected line");
    assert!(matches!(err, AppError::Protocol(ref msg) if msg == "line too long"));
    assert_eq!(next(&queue).await, Some(line(1)));
    assert_eq!(next(&queue).await, None);
}

#[tokio::test]
async fn waiting_reader_receives_an_error() {
    let queue = LineQueue::new();
    let reader = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.next_line().await })
    };

    tokio::task::yield_now().await;
    queue.push_error(AppError::Protocol("line too long".into()));

    let received = reader.await.expect("reader task").expect("entry");
    assert!(matches!(received, Err(AppError::Protocol(_))));
}

//! Unit tests for the completion notifier's ordering and at-most-once rule.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use session_relay::runner::notifier::{
    CompletionNotifier, CompletionReport, CompletionSink, CompletionStatus, Flusher, NoopFlusher,
};
use session_relay::{AppError, Result};

type Log = Arc<Mutex<Vec<String>>>;

struct RecordingFlusher {
    log: Log,
    fail: bool,
}

impl Flusher for RecordingFlusher {
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.log.lock().unwrap().push("flush".into());
            if self.fail {
                Err(AppError::Flush("disk full".into()))
            } else {
                Ok(())
            }
        })
    }
}

struct RecordingSink {
    log: Log,
    reports: Arc<Mutex<Vec<CompletionReport>>>,
    fail: bool,
}

impl CompletionSink for RecordingSink {
    fn deliver<'a>(
        &'a self,
        report: &'a CompletionReport,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.log.lock().unwrap().push("deliver".into());
            self.reports.lock().unwrap().push(report.clone());
            if self.fail {
                Err(AppError::Notify("503".into()))
            } else {
                Ok(())
            }
        })
    }
}

fn notifier(
    flush_fails: bool,
    deliver_fails: bool,
) -> (CompletionNotifier, Log, Arc<Mutex<Vec<CompletionReport>>>) {
    let log = Log::default();
    let reports = Arc::new(Mutex::new(Vec::new()));
    let notifier = CompletionNotifier::new(
        Box::new(RecordingFlusher {
            log: Arc::clone(&log),
            fail: flush_fails,
        }),
        Some(Box::new(RecordingSink {
            log: Arc::clone(&log),
            reports: Arc::clone(&reports),
            fail: deliver_fails,
        })),
    );
    (notifier, log, reports)
}

#[tokio::test]
async fn flush_precedes_delivery() {
    let (notifier, log, reports) = notifier(false, false);

    notifier
        .notify(CompletionStatus::Completed, Some("abc"), None)
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["flush", "deliver"]);
    assert_eq!(
        *reports.lock().unwrap(),
        vec![CompletionReport {
            status: CompletionStatus::Completed,
            session_id: Some("abc".into()),
            error_message: None,
        }]
    );
}

#[tokio::test]
async fn flush_failure_still_delivers() {
    let (notifier, log, reports) = notifier(true, false);

    notifier
        .notify(CompletionStatus::Error, None, Some("boom"))
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["flush", "deliver"]);
    assert_eq!(
        reports.lock().unwrap()[0].error_message.as_deref(),
        Some("boom")
    );
}

#[tokio::test]
async fn delivery_failure_is_not_retried() {
    let (notifier, log, _reports) = notifier(false, true);

    notifier
        .notify(CompletionStatus::Completed, Some("abc"), None)
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["flush", "deliver"]);
    assert!(notifier.has_notified());
}

#[tokio::test]
async fn second_notify_is_ignored() {
    let (notifier, log, reports) = notifier(false, false);

    notifier
        .notify(CompletionStatus::Completed, Some("abc"), None)
        .await;
    notifier
        .notify(CompletionStatus::Error, Some("abc"), Some("late"))
        .await;

    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(reports.lock().unwrap().len(), 1);
    assert_eq!(reports.lock().unwrap()[0].status, CompletionStatus::Completed);
}

#[tokio::test]
async fn notifier_without_sink_only_flushes() {
    let notifier = CompletionNotifier::new(Box::new(NoopFlusher), None);

    notifier
        .notify(CompletionStatus::Completed, Some("abc"), None)
        .await;

    assert!(notifier.has_notified());
}

#[test]
fn report_serializes_camel_case_and_omits_absent_fields() {
    let completed = CompletionReport {
        status: CompletionStatus::Completed,
        session_id: Some("abc".into()),
        error_message: None,
    };
    let failed = CompletionReport {
        status: CompletionStatus::Error,
        session_id: None,
        error_message: Some("boom".into()),
    };

    assert_eq!(
        serde_json::to_value(&completed).expect("serialize"),
        serde_json::json!({"status": "completed", "sessionId": "abc"})
    );
    assert_eq!(
        serde_json::to_value(&failed).expect("serialize"),
        serde_json::json!({"status": "error", "errorMessage": "boom"})
    );
}

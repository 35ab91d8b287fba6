//! Unit tests for the session model and its lifecycle rules.

use session_relay::models::session::{Session, SessionMetrics, SessionStatus};

#[test]
fn new_session_is_pending_without_id() {
    let session = Session::new();
    assert_eq!(session.status, SessionStatus::Pending);
    assert!(session.id().is_none());
    assert_eq!(session.metrics, SessionMetrics::default());
}

#[test]
fn id_is_assigned_once() {
    let mut session = Session::new();

    assert!(session.assign_id("abc"));
    assert!(!session.assign_id("def"));
    assert_eq!(session.id(), Some("abc"));
}

#[test]
fn allowed_transitions() {
    let mut session = Session::new();
    assert!(session.transition(SessionStatus::Running));
    assert!(session.transition(SessionStatus::Completed));

    let mut session = Session::new();
    assert!(session.transition(SessionStatus::Errored));

    let mut session = Session::new();
    session.transition(SessionStatus::Running);
    assert!(session.transition(SessionStatus::Errored));
}

#[test]
fn terminal_states_do_not_transition() {
    let mut session = Session::new();
    session.transition(SessionStatus::Running);
    session.transition(SessionStatus::Completed);

    assert!(!session.transition(SessionStatus::Errored));
    assert!(!session.transition(SessionStatus::Running));
    assert_eq!(session.status, SessionStatus::Completed);
}

#[test]
fn pending_cannot_skip_to_completed() {
    let mut session = Session::new();
    assert!(!session.can_transition_to(SessionStatus::Completed));
    assert!(!session.transition(SessionStatus::Completed));
}

#[test]
fn terminal_statuses() {
    assert!(!SessionStatus::Pending.is_terminal());
    assert!(!SessionStatus::Running.is_terminal());
    assert!(SessionStatus::Completed.is_terminal());
    assert!(SessionStatus::Errored.is_terminal());
}

#[test]
fn status_accepts_error_alias() {
    let status: SessionStatus = serde_json::from_str("\"error\"").expect("alias");
    assert_eq!(status, SessionStatus::Errored);
    assert_eq!(
        serde_json::to_string(&SessionStatus::Errored).expect("serialize"),
        "\"errored\""
    );
}

#[test]
fn metrics_fill_missing_fields_with_zero() {
    let metrics: SessionMetrics = serde_json::from_str("{\"num_turns\":2}").expect("metrics");
    assert_eq!(metrics.num_turns, 2);
    assert_eq!(metrics.duration_ms, 0);
    assert!(metrics.total_cost_usd.abs() < f64::EPSILON);
}

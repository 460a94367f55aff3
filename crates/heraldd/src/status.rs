//! Service status and change notifications.
//!
//! [`StatusTracker`] holds the service's code, message and details. Every
//! effective change is reported to registered [`StatusObserver`]s; changes the
//! [`NotificationPolicy`] selects are additionally published as a
//! `StatusUpdate` notification through a [`StatusSink`] once the sink is
//! ready.

use std::sync::{Arc, Mutex, PoisonError};

use herald_config::StatusNotifications;
use herald_types::{Envelope, ServiceEvent, ValueMap, fields};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

use crate::directory::BroadcastError;

const STATUS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::status");

/// Point-in-time copy of the service status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    /// Status code; `0` until set.
    pub code: i64,
    /// Free-form status message.
    pub message: String,
    /// Structured details.
    pub details: ValueMap,
}

impl StatusSnapshot {
    /// Writes the status fields and the current server time into `envelope`.
    pub fn write_fields(&self, envelope: &mut Envelope) {
        envelope.insert(fields::STATUS_CODE, self.code);
        envelope.insert(fields::STATUS_MESSAGE, self.message.as_str());
        envelope.insert(fields::STATUS_DETAILS, self.details.clone());
        envelope.insert(fields::SERVER_TIME, server_time());
    }

    /// Builds the `StatusUpdate` notification for this snapshot.
    pub fn notification(&self) -> Envelope {
        let mut envelope = Envelope::notification(ServiceEvent::StatusUpdate);
        self.write_fields(&mut envelope);
        envelope
    }
}

/// Which parts of the status changed in one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusChange {
    /// The code changed.
    pub code: bool,
    /// The message changed.
    pub message: bool,
    /// The details changed.
    pub details: bool,
}

impl StatusChange {
    fn between(before: &StatusSnapshot, after: &StatusSnapshot) -> Self {
        Self {
            code: before.code != after.code,
            message: before.message != after.message,
            details: before.details != after.details,
        }
    }

    /// Returns `true` when nothing changed.
    pub fn is_empty(self) -> bool {
        !(self.code || self.message || self.details)
    }
}

/// Decides which status changes are broadcast.
pub trait NotificationPolicy: Send + Sync {
    /// Returns `true` when `change` should produce a notification.
    fn should_notify(&self, change: StatusChange) -> bool;
}

/// Notifies only when the code changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeChangesOnly;

impl NotificationPolicy for CodeChangesOnly {
    fn should_notify(&self, change: StatusChange) -> bool {
        change.code
    }
}

/// Notifies on any effective change.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyChange;

impl NotificationPolicy for AnyChange {
    fn should_notify(&self, change: StatusChange) -> bool {
        !change.is_empty()
    }
}

/// Returns the policy matching a configured setting.
pub fn policy_for(setting: StatusNotifications) -> Arc<dyn NotificationPolicy> {
    match setting {
        StatusNotifications::Code => Arc::new(CodeChangesOnly),
        StatusNotifications::Any => Arc::new(AnyChange),
    }
}

/// Destination for status notifications.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSink: Send + Sync {
    /// Returns `true` when notifications can be delivered.
    fn ready(&self) -> bool;

    /// Publishes a notification; returns the number of deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError`] when a delivery fails.
    fn publish(&self, notification: &Envelope) -> Result<usize, BroadcastError>;
}

/// Receives every effective status change, whatever the policy says.
pub trait StatusObserver: Send + Sync {
    /// Invoked after the status changed.
    fn status_changed(&self, snapshot: &StatusSnapshot, change: StatusChange);
}

/// Thread-safe holder of the service status.
pub struct StatusTracker {
    state: Mutex<StatusSnapshot>,
    policy: Arc<dyn NotificationPolicy>,
    sink: Arc<dyn StatusSink>,
    observers: Mutex<Vec<Arc<dyn StatusObserver>>>,
}

impl StatusTracker {
    /// Creates a tracker with code `0`, an empty message and no details.
    pub fn new(sink: Arc<dyn StatusSink>, policy: Arc<dyn NotificationPolicy>) -> Self {
        Self {
            state: Mutex::new(StatusSnapshot::default()),
            policy,
            sink,
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers an observer.
    pub fn add_observer(&self, observer: Arc<dyn StatusObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Current status.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current status code.
    pub fn code(&self) -> i64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .code
    }

    /// Sets the status code. Returns `true` when the code changed.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError`] when the resulting notification could not
    /// reach every subscriber. The new code is kept.
    pub fn set_code(&self, code: i64) -> Result<bool, BroadcastError> {
        self.apply(|status| status.code = code)
    }

    /// Sets the status message. Returns `true` when the message changed.
    ///
    /// # Errors
    ///
    /// See [`StatusTracker::set_code`].
    pub fn set_message(&self, message: impl Into<String>) -> Result<bool, BroadcastError> {
        let message = message.into();
        self.apply(|status| status.message = message)
    }

    /// Sets code and message as one update.
    ///
    /// # Errors
    ///
    /// See [`StatusTracker::set_code`].
    pub fn set_status(&self, code: i64, message: impl Into<String>) -> Result<bool, BroadcastError> {
        let message = message.into();
        self.apply(|status| {
            status.code = code;
            status.message = message;
        })
    }

    /// Edits the details map in place.
    ///
    /// # Errors
    ///
    /// See [`StatusTracker::set_code`].
    pub fn update_details(
        &self,
        edit: impl FnOnce(&mut ValueMap),
    ) -> Result<bool, BroadcastError> {
        self.apply(|status| edit(&mut status.details))
    }

    fn apply(&self, mutate: impl FnOnce(&mut StatusSnapshot)) -> Result<bool, BroadcastError> {
        let (snapshot, change) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let before = state.clone();
            mutate(&mut *state);
            (state.clone(), StatusChange::between(&before, &state))
        };
        if change.is_empty() {
            return Ok(false);
        }

        debug!(
            target: STATUS_TARGET,
            code = snapshot.code,
            message = %snapshot.message,
            "status changed"
        );
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.status_changed(&snapshot, change);
        }

        if !self.policy.should_notify(change) {
            return Ok(true);
        }
        if !self.sink.ready() {
            debug!(target: STATUS_TARGET, "status notification skipped; sink not ready");
            return Ok(true);
        }
        if let Err(error) = self.sink.publish(&snapshot.notification()) {
            warn!(target: STATUS_TARGET, error = %error, "status notification incomplete");
            return Err(error);
        }
        Ok(true)
    }
}

pub(crate) fn server_time() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use herald_types::{EnvelopeType, ErrorKind, Identity, Value};
    use rstest::rstest;

    use super::*;
    use crate::transport::TransportError;

    fn tracker(sink: MockStatusSink, policy: Arc<dyn NotificationPolicy>) -> StatusTracker {
        StatusTracker::new(Arc::new(sink), policy)
    }

    #[test]
    fn setting_the_same_code_does_not_notify() {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().never();
        sink.expect_publish().never();
        let status = tracker(sink, Arc::new(CodeChangesOnly));

        assert!(!status.set_code(0).expect("no-op"));
    }

    #[test]
    fn a_code_change_publishes_once_when_ready() {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().times(1).return_const(true);
        sink.expect_publish()
            .withf(|notification| {
                notification.kind() == EnvelopeType::Notification
                    && notification.value(fields::STATUS_CODE) == Some(&Value::Int(3))
                    && notification.value(fields::SERVER_TIME).is_some()
            })
            .times(1)
            .returning(|_| Ok(1));
        let status = tracker(sink, Arc::new(CodeChangesOnly));

        assert!(status.set_code(3).expect("changed"));
        assert!(!status.set_code(3).expect("unchanged"));
    }

    #[test]
    fn changes_are_kept_but_not_sent_before_the_sink_is_ready() {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().return_const(false);
        sink.expect_publish().never();
        let status = tracker(sink, Arc::new(CodeChangesOnly));

        assert!(status.set_code(7).expect("changed"));
        assert_eq!(status.code(), 7);
    }

    #[rstest]
    #[case::code_only(Arc::new(CodeChangesOnly) as Arc<dyn NotificationPolicy>, 0)]
    #[case::any_change(Arc::new(AnyChange) as Arc<dyn NotificationPolicy>, 1)]
    fn message_changes_follow_the_policy(
        #[case] policy: Arc<dyn NotificationPolicy>,
        #[case] expected: usize,
    ) {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().return_const(true);
        sink.expect_publish().times(expected).returning(|_| Ok(0));
        let status = tracker(sink, policy);

        assert!(status.set_message("warming up").expect("changed"));
    }

    #[test]
    fn detail_edits_are_detected() {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().return_const(true);
        sink.expect_publish().times(1).returning(|_| Ok(0));
        let status = tracker(sink, Arc::new(AnyChange));

        assert!(
            status
                .update_details(|details| {
                    details.insert("queue", 4_i64);
                })
                .expect("changed")
        );
        assert!(
            !status
                .update_details(|details| {
                    details.insert("queue", 4_i64);
                })
                .expect("unchanged")
        );
    }

    #[test]
    fn publish_failures_are_returned_after_the_change_is_kept() {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().return_const(true);
        sink.expect_publish().returning(|_| {
            Err(BroadcastError::PartialFailure {
                target: Identity::parse("b@example.org").expect("identity"),
                attempted: 2,
                failed: 1,
                source: TransportError::delivery("b@example.org", "refused"),
            })
        });
        let status = tracker(sink, Arc::new(CodeChangesOnly));

        let error = status.set_code(2).expect_err("partial failure");

        assert_eq!(error.kind(), ErrorKind::BroadcastPartialFailure);
        assert_eq!(status.code(), 2);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<StatusChange>>);

    impl StatusObserver for Recorder {
        fn status_changed(&self, _snapshot: &StatusSnapshot, change: StatusChange) {
            self.0.lock().expect("changes").push(change);
        }
    }

    #[test]
    fn observers_see_changes_the_policy_ignores() {
        let mut sink = MockStatusSink::new();
        sink.expect_ready().never();
        sink.expect_publish().never();
        let status = tracker(sink, Arc::new(CodeChangesOnly));
        let recorder = Arc::new(Recorder::default());
        status.add_observer(recorder.clone());

        status.set_message("degraded").expect("changed");

        let changes = recorder.0.lock().expect("changes");
        assert_eq!(
            *changes,
            vec![StatusChange {
                message: true,
                ..StatusChange::default()
            }]
        );
    }
}

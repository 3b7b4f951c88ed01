//! Actor reports and liveness.
//!
//! A report is an envelope of alternating name/value pairs. The host stamps
//! `lastActive` (a 64-bit monotonic millisecond clock value) on every
//! dispatch; everything else comes from the backend through
//! [`ActorHandle::set_report`](crate::actor::ActorHandle::set_report).
//! `lastActive` is liveness, not data, so [`ActorReport::fields`] never
//! yields it.

use crate::message::{DecodeError, Envelope, Value};
use lazy_static::lazy_static;
use std::time::Instant;

/// Name of the liveness field.
pub const LAST_ACTIVE: &str = "lastActive";

/// An actor counts as active when it dispatched within this window.
pub const LIVENESS_WINDOW_MS: i64 = 100;

lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

/// Milliseconds on the process-wide monotonic clock.
pub fn monotonic_ms() -> i64 {
    EPOCH.elapsed().as_millis() as i64
}

/// `true` iff `now - last_active < 100` ms.
pub fn is_active(last_active: i64, now: i64) -> bool {
    now - last_active < LIVENESS_WINDOW_MS
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorReport {
    last_active: Option<i64>,
    fields: Vec<(String, Value)>,
}

impl ActorReport {
    /// Read a name/value pair envelope. A `lastActive` pair must carry a
    /// 64-bit integer.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        let mut report = ActorReport::default();
        let mut reader = envelope.reader();
        while reader.remaining() > 0 {
            let name = reader.pop_str()?;
            if name == LAST_ACTIVE {
                report.last_active = Some(reader.pop_int64()?);
            } else {
                report.fields.push((name, reader.pop()?.clone()));
            }
        }
        reader.finish()?;
        Ok(report)
    }

    /// `lastActive` first (when stamped), then the backend's fields.
    pub fn to_envelope(&self) -> Envelope {
        let mut envelope = Envelope::new();
        if let Some(stamp) = self.last_active {
            envelope.push(LAST_ACTIVE);
            envelope.push(stamp);
        }
        for (name, value) in &self.fields {
            envelope.push(name.as_str());
            envelope.push(value.clone());
        }
        envelope
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn last_active(&self) -> Option<i64> {
        self.last_active
    }

    pub fn stamp(&mut self, now: i64) {
        self.last_active = Some(now);
    }

    /// Replace the backend fields, keeping the liveness stamp.
    pub(crate) fn replace_fields(&mut self, other: ActorReport) {
        self.fields = other.fields;
    }

    /// Never-stamped reports are inactive.
    pub fn is_active(&self, now: i64) -> bool {
        self.last_active.is_some_and(|stamp| is_active(stamp, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn liveness_boundary_is_exclusive() {
        let envelope = Envelope::new()
            .with(LAST_ACTIVE)
            .with(1_000i64)
            .with("count")
            .with(3i64);
        let report = ActorReport::from_envelope(&envelope).unwrap();

        assert!(report.is_active(1_000));
        assert!(report.is_active(1_099));
        assert!(!report.is_active(1_100));
        assert!(!report.is_active(5_000));
    }

    #[test]
    fn last_active_is_not_ordinary_data() {
        let envelope = Envelope::new()
            .with("count")
            .with(3i64)
            .with(LAST_ACTIVE)
            .with(42i64)
            .with("state")
            .with("playing");
        let report = ActorReport::from_envelope(&envelope).unwrap();
        let names: Vec<_> = report.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["count", "state"]);
        assert_eq!(report.last_active(), Some(42));
        assert_eq!(report.field("count"), Some(&Value::Int64(3)));
    }

    #[test]
    fn malformed_reports_are_decode_errors() {
        let odd = Envelope::new().with("count");
        assert_eq!(
            ActorReport::from_envelope(&odd),
            Err(DecodeError::Truncated { position: 1 })
        );
        let narrow = Envelope::new().with(LAST_ACTIVE).with(5);
        assert!(matches!(
            ActorReport::from_envelope(&narrow),
            Err(DecodeError::TypeMismatch { expected: 'h', .. })
        ));
    }

    #[test]
    fn unstamped_report_is_inactive() {
        let mut report = ActorReport::default();
        assert!(!report.is_active(0));
        report.stamp(monotonic_ms());
        assert!(report.is_active(monotonic_ms()));
        assert_eq!(report.to_envelope().address(), Some(LAST_ACTIVE));
    }
}

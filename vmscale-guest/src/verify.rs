//! Before/after verification of guest snapshots.
//!
//! After a disruptive platform operation the guests themselves must be
//! intact: their clocks still advancing, their boot time untouched. The
//! verifier pairs two snapshot sweeps and checks each field against its
//! rule, collecting every violation rather than stopping at the first.

use chrono::DateTime;
use tracing::info;

use crate::error::{GuestError, Violation};
use crate::probe::GuestSnapshot;

/// How one field must behave between two sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// Values parse as RFC 3339 datetimes and must strictly increase.
    StrictlyIncreasing,
    /// Values must be byte-identical.
    Unchanged,
}

/// The rules the standard battery is verified under: the guest clock keeps
/// moving and the guest did not reboot.
pub fn standard_rules() -> Vec<(String, FieldRule)> {
    vec![
        ("datetime".to_string(), FieldRule::StrictlyIncreasing),
        ("btime".to_string(), FieldRule::Unchanged),
    ]
}

/// Checks paired before/after snapshots against per-field rules.
pub struct GuestVerifier {
    rules: Vec<(String, FieldRule)>,
}

impl Default for GuestVerifier {
    fn default() -> Self {
        Self::new(standard_rules())
    }
}

impl GuestVerifier {
    pub fn new(rules: Vec<(String, FieldRule)>) -> Self {
        Self { rules }
    }

    /// Verify `after` against `before`, snapshot by snapshot.
    ///
    /// Snapshots pair by index and must describe the same resources in the
    /// same order. All violations across the fleet are collected into one
    /// [`GuestError::Verification`].
    pub fn verify(
        &self,
        before: &[GuestSnapshot],
        after: &[GuestSnapshot],
    ) -> Result<(), GuestError> {
        if before.is_empty() {
            return Err(GuestError::InvalidArgument(
                "nothing to verify".to_string(),
            ));
        }
        if before.len() != after.len() {
            return Err(GuestError::InvalidArgument(format!(
                "{} snapshots before, {} after",
                before.len(),
                after.len()
            )));
        }

        let mut violations = Vec::new();
        for (before_snapshot, after_snapshot) in before.iter().zip(after) {
            if before_snapshot.resource != after_snapshot.resource {
                return Err(GuestError::InvalidArgument(format!(
                    "snapshot order mismatch: {} paired with {}",
                    before_snapshot.resource, after_snapshot.resource
                )));
            }
            for (field, rule) in &self.rules {
                check_field(before_snapshot, after_snapshot, field, *rule, &mut violations);
            }
        }

        if !violations.is_empty() {
            return Err(GuestError::Verification { violations });
        }
        info!(count = before.len(), "guest snapshots verified");
        Ok(())
    }
}

fn check_field(
    before: &GuestSnapshot,
    after: &GuestSnapshot,
    field: &str,
    rule: FieldRule,
    violations: &mut Vec<Violation>,
) {
    let before_value = before.fields.get(field);
    let after_value = after.fields.get(field);
    let (Some(before_value), Some(after_value)) = (before_value, after_value) else {
        violations.push(Violation {
            resource: before.resource.clone(),
            field: field.to_string(),
            before: before_value.cloned(),
            after: after_value.cloned(),
            reason: "field missing from snapshot".to_string(),
        });
        return;
    };

    let reason = match rule {
        FieldRule::StrictlyIncreasing => {
            match (
                DateTime::parse_from_rfc3339(before_value),
                DateTime::parse_from_rfc3339(after_value),
            ) {
                (Ok(before_time), Ok(after_time)) => {
                    if after_time > before_time {
                        return;
                    }
                    "did not strictly increase"
                }
                _ => "not an RFC 3339 datetime",
            }
        }
        FieldRule::Unchanged => {
            if before_value == after_value {
                return;
            }
            "changed across the run"
        }
    };

    violations.push(Violation {
        resource: before.resource.clone(),
        field: field.to_string(),
        before: Some(before_value.clone()),
        after: Some(after_value.clone()),
        reason: reason.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use vmscale_interfaces::ResourceId;

    fn snapshot(name: &str, datetime: &str, btime: &str) -> GuestSnapshot {
        let mut fields = BTreeMap::new();
        fields.insert("datetime".to_string(), datetime.to_string());
        fields.insert("btime".to_string(), btime.to_string());
        GuestSnapshot {
            resource: ResourceId::namespaced(name, "scale-test"),
            fields,
        }
    }

    #[test]
    fn advancing_clock_and_stable_btime_pass() {
        let before = vec![
            snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000"),
            snapshot("vm-1", "2025-06-18T09:30:13+00:00", "1718700005"),
        ];
        let after = vec![
            snapshot("vm-0", "2025-06-18T10:02:44+00:00", "1718700000"),
            snapshot("vm-1", "2025-06-18T10:02:45+00:00", "1718700005"),
        ];

        GuestVerifier::default().verify(&before, &after).unwrap();
    }

    #[test]
    fn equal_datetimes_violate_strict_increase() {
        let before = vec![snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000")];
        let after = vec![snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000")];

        let error = GuestVerifier::default().verify(&before, &after).unwrap_err();
        match error {
            GuestError::Verification { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "datetime");
                assert!(violations[0].reason.contains("strictly increase"));
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[test]
    fn changed_btime_means_the_guest_rebooted() {
        let before = vec![snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000")];
        let after = vec![snapshot("vm-0", "2025-06-18T10:02:44+00:00", "1718709999")];

        let error = GuestVerifier::default().verify(&before, &after).unwrap_err();
        match error {
            GuestError::Verification { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "btime");
                assert_eq!(violations[0].before.as_deref(), Some("1718700000"));
                assert_eq!(violations[0].after.as_deref(), Some("1718709999"));
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[test]
    fn violations_are_collected_across_the_fleet() {
        let before = vec![
            snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000"),
            snapshot("vm-1", "2025-06-18T09:30:12+00:00", "1718700000"),
        ];
        let after = vec![
            // vm-0 clock stalled, vm-1 rebooted.
            snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000"),
            snapshot("vm-1", "2025-06-18T10:02:44+00:00", "1718709999"),
        ];

        let error = GuestVerifier::default().verify(&before, &after).unwrap_err();
        match error {
            GuestError::Verification { violations } => {
                assert_eq!(violations.len(), 2);
                assert_eq!(violations[0].resource.name, "vm-0");
                assert_eq!(violations[0].field, "datetime");
                assert_eq!(violations[1].resource.name, "vm-1");
                assert_eq!(violations[1].field, "btime");
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[test]
    fn missing_rule_field_is_a_violation() {
        let before = vec![snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1718700000")];
        let mut stripped = snapshot("vm-0", "2025-06-18T10:02:44+00:00", "1718700000");
        stripped.fields.remove("btime");
        let after = vec![stripped];

        let error = GuestVerifier::default().verify(&before, &after).unwrap_err();
        match error {
            GuestError::Verification { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "btime");
                assert!(violations[0].reason.contains("missing"));
                assert!(violations[0].after.is_none());
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_datetime_is_a_violation() {
        let before = vec![snapshot("vm-0", "yesterday", "1718700000")];
        let after = vec![snapshot("vm-0", "today", "1718700000")];

        let error = GuestVerifier::default().verify(&before, &after).unwrap_err();
        match error {
            GuestError::Verification { violations } => {
                assert_eq!(violations.len(), 1);
                assert!(violations[0].reason.contains("RFC 3339"));
            }
            other => panic!("expected verification error, got {other:?}"),
        }
    }

    #[test]
    fn cardinality_mismatch_is_invalid() {
        let before = vec![snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1")];
        let error = GuestVerifier::default().verify(&before, &[]).unwrap_err();
        assert!(matches!(error, GuestError::InvalidArgument(_)));
    }

    #[test]
    fn resource_order_mismatch_is_invalid() {
        let before = vec![
            snapshot("vm-0", "2025-06-18T09:30:12+00:00", "1"),
            snapshot("vm-1", "2025-06-18T09:30:12+00:00", "1"),
        ];
        let after = vec![
            snapshot("vm-1", "2025-06-18T10:02:44+00:00", "1"),
            snapshot("vm-0", "2025-06-18T10:02:44+00:00", "1"),
        ];

        let error = GuestVerifier::default().verify(&before, &after).unwrap_err();
        assert!(matches!(error, GuestError::InvalidArgument(_)));
    }

    #[test]
    fn empty_sweeps_are_invalid() {
        let error = GuestVerifier::default().verify(&[], &[]).unwrap_err();
        assert!(matches!(error, GuestError::InvalidArgument(_)));
    }
}

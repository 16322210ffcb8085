// libs/consultation-cell/src/services/admission.rs
use chrono::FixedOffset;
use tracing::debug;

use crate::models::{AdmissionDecision, Appointment, AppointmentStatus, CountdownLabel};

/// Timing rules for session admission.
#[derive(Debug, Clone)]
pub struct AdmissionRules {
    /// How early before the scheduled start a session may begin.
    pub early_start_grace_ms: i64,
}

impl Default for AdmissionRules {
    fn default() -> Self {
        Self {
            early_start_grace_ms: 120_000,
        }
    }
}

/// Decides, per appointment, whether a session may start right now and what
/// countdown to show. Pure computation that never suspends and never fails:
/// an unusable schedule yields `can_start = false` and an unknown label.
pub struct AdmissionController {
    rules: AdmissionRules,
    tz: FixedOffset,
}

impl AdmissionController {
    pub fn new(tz: FixedOffset) -> Self {
        Self {
            rules: AdmissionRules::default(),
            tz,
        }
    }

    pub fn with_rules(tz: FixedOffset, rules: AdmissionRules) -> Self {
        Self { rules, tz }
    }

    pub fn evaluate(&self, appointment: &Appointment, now_ms: i64) -> AdmissionDecision {
        let Some(start_ms) = appointment.scheduled_at_ms(self.tz) else {
            return AdmissionDecision {
                can_start: false,
                countdown: CountdownLabel::Unknown,
            };
        };
        let end_ms = start_ms + appointment.duration_min() * 60_000;

        let can_start = match appointment.status {
            status if status.is_terminal() => false,
            // A session already marked in-progress stays joinable until its
            // slot ends, regardless of the early window: the doctor must be
            // able to re-enter a dropped call.
            AppointmentStatus::InProgress => now_ms < end_ms,
            _ => {
                let in_window =
                    now_ms >= start_ms - self.rules.early_start_grace_ms && now_ms < end_ms;
                match appointment.can_start {
                    // The backend override narrows the window, never widens it.
                    Some(override_flag) => override_flag && in_window,
                    None => in_window,
                }
            }
        };

        let countdown = if now_ms >= start_ms {
            CountdownLabel::StartingNow
        } else {
            let mins = (start_ms - now_ms + 59_999) / 60_000;
            CountdownLabel::StartsInMinutes(mins)
        };

        debug!(
            appointment_id = appointment.id,
            status = %appointment.status,
            can_start,
            "Evaluated admission"
        );

        AdmissionDecision { can_start, countdown }
    }
}

// libs/consultation-cell/src/services/reconcile.rs
use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate, TimeZone};
use tracing::debug;

use crate::models::{Appointment, DashboardData};

/// Merges appointment candidate lists arriving from partial backend sources
/// into one ordered, deduplicated collection.
pub struct AppointmentReconciler {
    tz: FixedOffset,
}

/// Dashboard rows plus whether the generic appointments list must still be
/// consulted. An upcoming-only dashboard cannot be trusted to carry the
/// in-progress sessions, so its rows are kept but supplemented.
#[derive(Debug)]
pub struct DashboardReconciliation {
    pub appointments: Vec<Appointment>,
    pub fallback_needed: bool,
}

impl AppointmentReconciler {
    pub fn new(tz: FixedOffset) -> Self {
        Self { tz }
    }

    /// Today's appointments from the dashboard payload. The combined list
    /// wins outright; otherwise in-progress candidates are merged ahead of
    /// upcoming ones. The fallback is required whenever neither the combined
    /// nor the in-progress list is present, even if upcoming rows exist:
    /// fallback rows are merged behind whatever the dashboard provided.
    pub fn reconcile_dashboard(&self, data: &DashboardData) -> DashboardReconciliation {
        if let Some(all) = &data.today_appointments {
            return DashboardReconciliation {
                appointments: self.merge_unique(&[all.as_slice()]),
                fallback_needed: false,
            };
        }
        let lists = [
            data.today_in_progress.as_deref().unwrap_or(&[]),
            data.today_upcoming.as_deref().unwrap_or(&[]),
        ];
        DashboardReconciliation {
            appointments: self.merge_unique(&lists),
            fallback_needed: data.today_in_progress.is_none(),
        }
    }

    /// Concatenate candidate lists in priority order, dropping later
    /// duplicates. First occurrence wins and relative order is preserved, so
    /// the merge is idempotent and never loses a non-duplicate record.
    pub fn merge_unique(&self, lists: &[&[Appointment]]) -> Vec<Appointment> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for list in lists {
            for appointment in *list {
                if seen.insert(appointment.merge_key()) {
                    out.push(appointment.clone());
                }
            }
        }
        debug!(merged = out.len(), "Reconciled appointment candidates");
        out
    }

    /// Fallback filter over a generic list: keep records scheduled on the
    /// server-timezone calendar date of `now_ms` whose status is not
    /// terminal. Records without a parseable schedule cannot be assigned to
    /// a day and are dropped here.
    pub fn filter_today(&self, items: Vec<Appointment>, now_ms: i64) -> Vec<Appointment> {
        let Some(today) = self.local_date(now_ms) else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter(|appt| !appt.status.is_terminal())
            .filter(|appt| {
                appt.scheduled_at
                    .map(|ndt| ndt.date() == today)
                    .unwrap_or(false)
            })
            .collect()
    }

    fn local_date(&self, now_ms: i64) -> Option<NaiveDate> {
        self.tz
            .timestamp_millis_opt(now_ms)
            .single()
            .map(|dt| dt.date_naive())
    }
}

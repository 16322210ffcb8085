// libs/consultation-cell/src/services/consult.rs
use std::sync::Arc;

use tracing::{debug, info, warn};

use shared_api::{ApiError, BackendClient};
use shared_config::ClientConfig;

use crate::models::{
    Appointment, AppointmentsPage, ConsultationEntry, ConsultationError, CountdownLabel,
    DashboardData, DashboardSummary, ListView, SessionPlan,
};
use crate::services::admission::AdmissionController;
use crate::services::launcher::SessionLauncher;
use crate::services::lifecycle::LifecycleService;
use crate::services::patient::PatientResolverService;
use crate::services::reconcile::AppointmentReconciler;
use crate::services::server_clock::{client_now_ms, ServerClock};

const FALLBACK_LIST_LIMIT: i64 = 200;

/// Result of one refresh cycle: reconciled, admission-annotated
/// appointments plus the clock updated with the latest server sample.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub entries: Vec<ConsultationEntry>,
    pub clock: ServerClock,
    pub summary: Option<DashboardSummary>,
}

/// Outcome of a user admission attempt.
#[derive(Debug)]
pub enum AdmissionOutcome {
    /// The session may start; carry out the plan.
    Admitted(SessionPlan),
    /// Not inside the admission window; show the countdown instead.
    NotYet(CountdownLabel),
}

/// Drives the consultation admission flow end to end: refresh →
/// reconciliation → admission annotation → (on user action) patient
/// resolution → completion transition → session plan.
pub struct ConsultationService {
    api: Arc<BackendClient>,
    reconciler: AppointmentReconciler,
    admission: AdmissionController,
    resolver: PatientResolverService,
    lifecycle: Arc<LifecycleService>,
    launcher: SessionLauncher,
}

impl ConsultationService {
    pub fn new(config: &ClientConfig) -> Self {
        let api = Arc::new(BackendClient::new(config));
        let tz = config.server_timezone();

        Self {
            reconciler: AppointmentReconciler::new(tz),
            admission: AdmissionController::new(tz),
            resolver: PatientResolverService::new(Arc::clone(&api)),
            lifecycle: Arc::new(LifecycleService::new(Arc::clone(&api))),
            launcher: SessionLauncher::new(config.video_base_url.clone()),
            api,
        }
    }

    /// Refresh today's consultations. The dashboard is the primary source;
    /// when it cannot vouch for in-progress sessions the generic list is
    /// fetched, filtered to today and merged behind the dashboard rows.
    /// Network failure degrades to an empty entry list.
    pub async fn refresh_today(
        &self,
        mut clock: ServerClock,
    ) -> Result<RefreshOutcome, ConsultationError> {
        let dashboard = self
            .api
            .get_data::<DashboardData>("/doctor/home_dashboard", &[])
            .await;

        let data = match dashboard {
            Ok(data) => data,
            Err(ApiError::Network(msg)) => {
                warn!(error = %msg, "Dashboard unreachable, showing empty state");
                return Ok(RefreshOutcome {
                    entries: Vec::new(),
                    clock,
                    summary: None,
                });
            }
            Err(err) => return Err(err.into()),
        };

        clock.record_sample(data.server_now_ms, client_now_ms());
        let summary = data.summary();

        let reconciled = self.reconciler.reconcile_dashboard(&data);
        let appointments = if reconciled.fallback_needed {
            debug!("Dashboard carried no in-progress list, supplementing from list fallback");
            let extra = self.fetch_today_fallback(&mut clock).await?;
            self.reconciler
                .merge_unique(&[reconciled.appointments.as_slice(), extra.as_slice()])
        } else {
            reconciled.appointments
        };

        let entries = self.annotate(appointments, &clock);
        info!(count = entries.len(), "Refreshed today's consultations");

        Ok(RefreshOutcome {
            entries,
            clock,
            summary: Some(summary),
        })
    }

    /// The ALL/UPCOMING/COMPLETED consultations list with server-side
    /// search, annotated the same way as the dashboard view.
    pub async fn list_consultations(
        &self,
        view: ListView,
        query: &str,
        limit: i64,
        offset: i64,
        mut clock: ServerClock,
    ) -> Result<RefreshOutcome, ConsultationError> {
        let page = self.fetch_page(view, query, limit, offset).await;

        let page = match page {
            Ok(page) => page,
            Err(ApiError::Network(msg)) => {
                warn!(error = %msg, "Appointments list unreachable, showing empty state");
                return Ok(RefreshOutcome {
                    entries: Vec::new(),
                    clock,
                    summary: None,
                });
            }
            Err(err) => return Err(err.into()),
        };

        clock.record_sample(page.server_now_ms, client_now_ms());
        let items = self.reconciler.merge_unique(&[page.items.as_slice()]);
        let entries = self.annotate(items, &clock);

        Ok(RefreshOutcome {
            entries,
            clock,
            summary: None,
        })
    }

    /// User pressed the start control on one appointment. Re-evaluates the
    /// admission with a fresh corrected now, resolves the patient, fires the
    /// completion transition and returns the session plan. The caller must
    /// disable the triggering control for the duration of this call and
    /// re-enable it on `LaunchFailed`.
    pub async fn admit(
        &self,
        appointment: &Appointment,
        clock: &ServerClock,
    ) -> Result<AdmissionOutcome, ConsultationError> {
        let now_ms = clock.corrected_now(client_now_ms());
        let decision = self.admission.evaluate(appointment, now_ms);
        if !decision.can_start {
            return Ok(AdmissionOutcome::NotYet(decision.countdown));
        }

        let patient = self.resolver.resolve(appointment).await?;

        let appointment_key = appointment.appointment_key().ok_or_else(|| {
            ConsultationError::LaunchFailed("appointment has no usable key".to_string())
        })?;

        // Initiating the session is what marks it completed; the launch
        // proceeds whether or not the transition lands. Spawned so that
        // dropping this future cannot cancel the call once fired, awaited so
        // the launch happens strictly after the attempt.
        let completion = self.lifecycle.spawn_mark_completed(appointment_key);
        let _ = completion.await;

        let plan = self.launcher.plan(appointment, &patient)?;
        Ok(AdmissionOutcome::Admitted(plan))
    }

    async fn fetch_page(
        &self,
        view: ListView,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<AppointmentsPage, ApiError> {
        self.api
            .get_data(
                "/doctor/appointments",
                &[
                    ("view", view.as_param().to_string()),
                    ("q", query.to_string()),
                    ("limit", limit.to_string()),
                    ("offset", offset.to_string()),
                ],
            )
            .await
    }

    async fn fetch_today_fallback(
        &self,
        clock: &mut ServerClock,
    ) -> Result<Vec<Appointment>, ConsultationError> {
        let page = match self.fetch_page(ListView::All, "", FALLBACK_LIST_LIMIT, 0).await {
            Ok(page) => page,
            Err(ApiError::Network(msg)) => {
                warn!(error = %msg, "Fallback list unreachable, showing empty state");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        clock.record_sample(page.server_now_ms, client_now_ms());
        let now_ms = clock.corrected_now(client_now_ms());
        let today = self.reconciler.filter_today(page.items, now_ms);
        Ok(self.reconciler.merge_unique(&[today.as_slice()]))
    }

    fn annotate(&self, appointments: Vec<Appointment>, clock: &ServerClock) -> Vec<ConsultationEntry> {
        let now_ms = clock.corrected_now(client_now_ms());
        appointments
            .into_iter()
            .map(|appointment| {
                let admission = self.admission.evaluate(&appointment, now_ms);
                ConsultationEntry {
                    appointment,
                    admission,
                }
            })
            .collect()
    }
}

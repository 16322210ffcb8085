// libs/consultation-cell/src/services/lifecycle.rs
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use shared_api::BackendClient;

use crate::models::ConsultationError;

/// Issues the idempotent completed transition against the backend when a
/// session is initiated. This core never performs any other status change;
/// scheduling data is owned by the external scheduling system.
pub struct LifecycleService {
    api: Arc<BackendClient>,
}

impl LifecycleService {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }

    /// Request the completed transition for one appointment key. The server
    /// side is idempotent, so an unacknowledged retry by the user is safe;
    /// this client never retries on its own.
    pub async fn mark_completed(&self, appointment_key: &str) -> Result<(), ConsultationError> {
        self.api
            .post_ack(
                "/doctor/mark_completed",
                json!({ "appointment_key": appointment_key }),
            )
            .await?;
        info!(appointment_key, "Appointment marked completed");
        Ok(())
    }

    /// Fire-and-forget variant used by the admission flow: the session
    /// launch proceeds whether or not this lands, and the task is never
    /// cancelled once spawned so the backend is not left ambiguous.
    pub fn spawn_mark_completed(
        self: &Arc<Self>,
        appointment_key: String,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = service.mark_completed(&appointment_key).await {
                warn!(
                    appointment_key = appointment_key.as_str(),
                    error = %err,
                    "Completion transition failed; session proceeds regardless"
                );
            }
        })
    }
}

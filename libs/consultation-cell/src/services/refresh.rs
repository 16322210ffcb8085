// libs/consultation-cell/src/services/refresh.rs
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::ConsultationError;
use crate::services::consult::{ConsultationService, RefreshOutcome};
use crate::services::server_clock::ServerClock;

/// Owns at most one in-flight refresh task. Spawning a new refresh aborts
/// the previous one, so latest-wins ordering is enforced structurally
/// instead of with ad hoc flags; teardown aborts whatever is still running.
#[derive(Default)]
pub struct RefreshCoordinator {
    current: Option<JoinHandle<()>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.current = Some(tokio::spawn(fut));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            debug!("Aborting superseded refresh task");
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Publishes refresh outcomes from the background worker to the UI loop.
/// The completion transition is never routed through here: once fired it
/// must not be cancelled.
pub struct ConsultationFeed {
    service: Arc<ConsultationService>,
    coordinator: RefreshCoordinator,
    tx: mpsc::UnboundedSender<Result<RefreshOutcome, ConsultationError>>,
}

impl ConsultationFeed {
    pub fn new(
        service: Arc<ConsultationService>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<Result<RefreshOutcome, ConsultationError>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                service,
                coordinator: RefreshCoordinator::new(),
                tx,
            },
            rx,
        )
    }

    /// Trigger a refresh with the given clock value. A refresh still in
    /// flight is aborted and never publishes its outcome.
    pub fn request_refresh(&mut self, clock: ServerClock) {
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        self.coordinator.spawn(async move {
            let outcome = service.refresh_today(clock).await;
            let _ = tx.send(outcome);
        });
    }

    /// Screen teardown: drop any in-flight refresh.
    pub fn shutdown(&mut self) {
        self.coordinator.cancel();
    }
}

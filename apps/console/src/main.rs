use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consultation_cell::{ConsultationService, ServerClock};
use shared_config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting telemedicine consultation console");

    let config = ClientConfig::from_env();
    if !config.is_configured() {
        anyhow::bail!("TELEMED_BACKEND_URL and TELEMED_AUTH_TOKEN must be set");
    }

    let service = ConsultationService::new(&config);
    let clock = ServerClock::new();

    let outcome = service
        .refresh_today(clock)
        .await
        .context("refreshing today's consultations")?;

    if let Some(summary) = &outcome.summary {
        println!(
            "{} ({}) — {} patients today, {} completed, rating {:.1}",
            summary.doctor_name,
            summary.doctor_specialization,
            summary.today_patients,
            summary.today_completed,
            summary.rating
        );
    }

    if outcome.entries.is_empty() {
        println!("No consultations today.");
        return Ok(());
    }

    for entry in &outcome.entries {
        let appt = &entry.appointment;
        println!(
            "[{}] {} ({}) — {} | {} | startable: {}",
            appt.status,
            appt.patient_name,
            appt.patient_meta(),
            appt.consult_type,
            entry.admission.countdown,
            entry.admission.can_start
        );
    }

    Ok(())
}

pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use models::{
    AdmissionDecision, Appointment, AppointmentStatus, ConsultType, ConsultationEntry,
    ConsultationError, CountdownLabel, ListView, ResolvedPatient,
};

pub use services::consult::{AdmissionOutcome, ConsultationService, RefreshOutcome};
pub use services::server_clock::{ServerClock, ServerTimeSample};

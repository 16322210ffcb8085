// libs/consultation-cell/src/services/patient.rs
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use shared_api::BackendClient;

use crate::models::{Appointment, ConsultationError, ResolvePatientData, ResolvedPatient};

/// Fills in a missing patient identity via the backend fallback resolution,
/// keyed by appointment public code (preferred) or numeric id.
pub struct PatientResolverService {
    api: Arc<BackendClient>,
}

impl PatientResolverService {
    pub fn new(api: Arc<BackendClient>) -> Self {
        Self { api }
    }

    /// Resolve the patient behind an appointment. Short-circuits without any
    /// network call when the appointment already carries a positive patient
    /// id. `MissingPatient` aborts downstream navigation; callers must not
    /// proceed with a zero id.
    pub async fn resolve(
        &self,
        appointment: &Appointment,
    ) -> Result<ResolvedPatient, ConsultationError> {
        if appointment.patient_id > 0 {
            debug!(
                patient_id = appointment.patient_id,
                "Patient already known, skipping resolution"
            );
            return Ok(ResolvedPatient {
                patient_id: appointment.patient_id,
                appointment_id: appointment.id,
            });
        }

        let body = {
            let code = appointment.public_code.trim();
            if !code.is_empty() {
                json!({ "appointment_key": code })
            } else if appointment.id > 0 {
                json!({ "appointment_id": appointment.id })
            } else {
                warn!("Appointment has neither public code nor id, cannot resolve patient");
                return Err(ConsultationError::MissingPatient);
            }
        };

        let data: ResolvePatientData = self.api.post_data("/doctor/resolve_patient", body).await?;

        if data.patient_id <= 0 {
            warn!(appointment_id = appointment.id, "Resolution returned no usable patient id");
            return Err(ConsultationError::MissingPatient);
        }

        let appointment_id = if data.appointment_id > 0 {
            data.appointment_id
        } else {
            appointment.id
        };

        info!(
            patient_id = data.patient_id,
            appointment_id, "Resolved patient identity"
        );

        Ok(ResolvedPatient {
            patient_id: data.patient_id,
            appointment_id,
        })
    }
}

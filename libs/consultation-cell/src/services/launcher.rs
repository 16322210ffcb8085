// libs/consultation-cell/src/services/launcher.rs
use tracing::{debug, info};

use crate::models::{
    Appointment, CallInvocation, ConsultType, ConsultationError, PrescriptionHandoff,
    ResolvedPatient, SessionPlan,
};

/// Branches the post-admission flow by consultation modality and prepares
/// the downstream prescription workflow handoff. Dispatch is a compile-time
/// `match` on `ConsultType`; there is no dynamic screen lookup.
pub struct SessionLauncher {
    video_base_url: String,
}

impl SessionLauncher {
    pub fn new(video_base_url: impl Into<String>) -> Self {
        Self {
            video_base_url: video_base_url.into(),
        }
    }

    /// Build the session plan for an admitted appointment. `LaunchFailed`
    /// means no call invocation could be constructed; the admission is not
    /// consumed and the triggering control must be re-enabled.
    pub fn plan(
        &self,
        appointment: &Appointment,
        patient: &ResolvedPatient,
    ) -> Result<SessionPlan, ConsultationError> {
        let appointment_key = appointment.appointment_key().ok_or_else(|| {
            ConsultationError::LaunchFailed("appointment has no usable key".to_string())
        })?;

        let call = match appointment.consult_type {
            ConsultType::Video => {
                let room = appointment.room_or_derived();
                if room.is_empty() {
                    return Err(ConsultationError::LaunchFailed(
                        "no call room could be derived".to_string(),
                    ));
                }
                Some(CallInvocation::Video {
                    url: build_video_url(&self.video_base_url, &room),
                })
            }
            ConsultType::Audio => {
                let phone = appointment.patient_phone.trim();
                if phone.is_empty() {
                    return Err(ConsultationError::LaunchFailed(
                        "no patient phone number on record".to_string(),
                    ));
                }
                Some(CallInvocation::Audio {
                    dial: build_dial_target(phone),
                })
            }
            // In-person: no call step, straight to the prescription workflow.
            ConsultType::Physical => None,
        };

        let prescription = PrescriptionHandoff {
            patient_id: patient.patient_id,
            appointment_id: patient.appointment_id,
            appointment_key,
            patient_name: appointment.patient_name.clone(),
            patient_meta: appointment.patient_meta(),
            consult_type: appointment.consult_type,
        };

        info!(
            appointment_id = prescription.appointment_id,
            consult_type = %prescription.consult_type,
            with_call = call.is_some(),
            "Built session plan"
        );

        Ok(SessionPlan { call, prescription })
    }
}

/// Normalize the video server base to https and append the room segment.
fn build_video_url(base: &str, room: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let normalized = if let Some(rest) = strip_prefix_ignore_case(base, "http://") {
        format!("https://{}", rest.trim_start_matches('/'))
    } else if strip_prefix_ignore_case(base, "https://").is_some() {
        base.to_string()
    } else {
        format!("https://{}", base)
    };
    let normalized = normalized.trim_end_matches('/');

    let room = room.trim().trim_start_matches('/');
    debug!(room, "Built video call URL");
    if room.is_empty() {
        normalized.to_string()
    } else {
        format!("{}/{}", normalized, room)
    }
}

fn build_dial_target(phone: &str) -> String {
    if phone.to_lowercase().starts_with("tel:") {
        phone.to_string()
    } else {
        format!("tel:{}", phone)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    // `get` refuses non-boundary offsets, which multibyte hosts can produce.
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

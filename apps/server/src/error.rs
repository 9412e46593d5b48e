use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::models::ApiResponse;

/// Errors raised by the availability/booking core.
///
/// `SlotUnavailable` comes from the advisory pre-check; `DuplicateSlot` from
/// the uniqueness constraint at insert time. Users see the same message for
/// both, but the latter is logged separately since it means a concurrent
/// request won the race.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid time label: {0:?}")]
    InvalidTimeFormat(String),
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("no barber could be resolved")]
    NoBarberResolved,
    #[error("slot {date} {time} is unavailable")]
    SlotUnavailable { date: String, time: String },
    #[error("slot {date} {time} taken by a concurrent booking")]
    DuplicateSlot { date: String, time: String },
    #[error("unknown service {0}")]
    UnknownService(i64),
    #[error("unknown barber {0}")]
    UnknownBarber(i64),
    #[error("appointment {0} not found")]
    AppointmentNotFound(i64),
    #[error("database error")]
    Store(#[from] sqlx::Error),
}

impl BookingError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTimeFormat(_) | Self::InvalidDate(_) => StatusCode::BAD_REQUEST,
            Self::NoBarberResolved => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SlotUnavailable { .. } | Self::DuplicateSlot { .. } => StatusCode::CONFLICT,
            Self::UnknownService(_) | Self::UnknownBarber(_) | Self::AppointmentNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// User-facing message (the booking UI shows these verbatim).
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidTimeFormat(_) => "Formato de hora inválido",
            Self::InvalidDate(_) => "Formato de fecha inválido",
            Self::NoBarberResolved => "Selecciona un barbero para continuar",
            // DuplicateSlot reads the same as SlotUnavailable on purpose:
            // the client just refreshes availability and re-prompts.
            Self::SlotUnavailable { .. } | Self::DuplicateSlot { .. } => {
                "Esa hora ya no está disponible. Elige otra."
            }
            Self::UnknownService(_) => "Servicio no encontrado",
            Self::UnknownBarber(_) => "Barbero no encontrado",
            Self::AppointmentNotFound(_) => "Cita no encontrada",
            Self::Store(_) => "Error interno. Intenta de nuevo.",
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        match &self {
            BookingError::Store(e) => tracing::error!("store error: {}", e),
            BookingError::DuplicateSlot { date, time } => {
                tracing::warn!(%date, %time, "lost booking race at insert")
            }
            _ => {}
        }
        (
            self.status(),
            Json(ApiResponse::<()>::error(self.user_message())),
        )
            .into_response()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_statuses() {
        let unavailable = BookingError::SlotUnavailable {
            date: "2030-03-06".into(),
            time: "9:00 AM".into(),
        };
        let duplicate = BookingError::DuplicateSlot {
            date: "2030-03-06".into(),
            time: "9:00 AM".into(),
        };
        assert_eq!(unavailable.status(), StatusCode::CONFLICT);
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        // Same user-facing message for both
        assert_eq!(unavailable.user_message(), duplicate.user_message());
    }

    #[test]
    fn test_validation_statuses() {
        assert_eq!(
            BookingError::InvalidTimeFormat("7 oclock".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::NoBarberResolved.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            BookingError::AppointmentNotFound(42).status(),
            StatusCode::NOT_FOUND
        );
    }
}

//! Fire-and-forget WhatsApp notifications through the external gateway.
//!
//! The gateway (a separate whatsapp-web bridge) accepts
//! `POST /send-message { type, phone, data }` and builds the client-facing
//! message text itself. Delivery is best-effort: sends are spawned onto the
//! runtime and failures are logged, never surfaced to the booking caller.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Cancelled,
}

impl EventKind {
    pub fn wire(self) -> &'static str {
        match self {
            EventKind::Created => "appointment_created",
            EventKind::Cancelled => "appointment_cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub client_name: String,
    pub date: String,
    pub time: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barber_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BookingEvent {
    pub kind: EventKind,
    pub client_phone: String,
    pub barber_phone: Option<String>,
    pub data: EventData,
}

#[derive(Clone)]
pub struct WhatsAppNotifier {
    http: reqwest::Client,
    gateway_url: Option<String>,
    admin_phone: Option<String>,
}

impl WhatsAppNotifier {
    pub fn new(gateway_url: Option<String>, admin_phone: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            gateway_url,
            admin_phone,
        }
    }

    /// Dispatch a booking event to the client, plus copies to the shop owner
    /// and the assigned barber when their phones are known. Never blocks the
    /// caller and never fails it.
    pub fn dispatch(&self, event: BookingEvent) {
        let Some(url) = self.gateway_url.clone() else {
            tracing::debug!(kind = event.kind.wire(), "gateway not configured, skipping notification");
            return;
        };

        let this = self.clone();
        tokio::spawn(async move {
            this.send(&url, &event.client_phone, &event).await;
            if let Some(admin) = this.admin_phone.clone() {
                this.send(&url, &admin, &event).await;
            }
            if let Some(barber) = event.barber_phone.clone() {
                this.send(&url, &barber, &event).await;
            }
        });
    }

    async fn send(&self, gateway_url: &str, phone: &str, event: &BookingEvent) {
        let url = format!("{}/send-message", gateway_url.trim_end_matches('/'));
        let result = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "type": event.kind.wire(),
                "phone": phone,
                "data": event.data,
            }))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::error!(
                    kind = event.kind.wire(),
                    status = %resp.status(),
                    "WhatsApp gateway rejected notification"
                );
            }
            Err(e) => {
                tracing::error!(kind = event.kind.wire(), "WhatsApp gateway unreachable: {}", e);
            }
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_kinds() {
        assert_eq!(EventKind::Created.wire(), "appointment_created");
        assert_eq!(EventKind::Cancelled.wire(), "appointment_cancelled");
    }

    #[test]
    fn test_event_data_wire_shape() {
        let data = EventData {
            client_name: "Juan Pérez".into(),
            date: "2030-03-06".into(),
            time: "9:00 AM".into(),
            service: "Corte Normal".into(),
            barber_name: None,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["clientName"], "Juan Pérez");
        assert_eq!(json["date"], "2030-03-06");
        assert_eq!(json["time"], "9:00 AM");
        assert_eq!(json["service"], "Corte Normal");
        // Absent barber never shows up on the wire
        assert!(json.get("barberName").is_none());
    }

    #[test]
    fn test_event_data_includes_barber_when_set() {
        let data = EventData {
            client_name: "Juan".into(),
            date: "2030-03-06".into(),
            time: "9:00 AM".into(),
            service: "Corte + Barba".into(),
            barber_name: Some("Luis".into()),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["barberName"], "Luis");
    }
}

//! Tracing layer that forwards ERROR events to the shop owner's WhatsApp.
//!
//! Goes through the same gateway the booking notifications use, with its
//! plain-message endpoint (`POST /send-message { phone, message }`). A burst
//! of cascading errors is throttled to one message per `MIN_INTERVAL`, and a
//! repeating error is only reported once per `DEDUP_WINDOW`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const MIN_INTERVAL: Duration = Duration::from_secs(10);
const DEDUP_WINDOW: Duration = Duration::from_secs(60);

// ── Layer ──

pub struct WhatsAppLayer {
    gateway_url: String,
    admin_phone: String,
    http: reqwest::Client,
    state: Mutex<LayerState>,
}

struct LayerState {
    last_sent: Instant,
    /// (hash, inserted_at) of recently reported errors.
    recent: Vec<(u64, Instant)>,
}

impl WhatsAppLayer {
    pub fn new(gateway_url: String, admin_phone: String) -> Self {
        Self {
            gateway_url,
            admin_phone,
            http: reqwest::Client::new(),
            state: Mutex::new(LayerState {
                last_sent: Instant::now() - MIN_INTERVAL, // allow first message immediately
                recent: Vec::new(),
            }),
        }
    }

    fn should_send(&self, hash: u64) -> bool {
        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return false,
        };
        let now = Instant::now();

        state
            .recent
            .retain(|(_, ts)| now.duration_since(*ts) < DEDUP_WINDOW);

        let is_dup = state.recent.iter().any(|(h, _)| *h == hash);
        let too_soon = now.duration_since(state.last_sent) < MIN_INTERVAL;

        if is_dup || too_soon {
            return false;
        }
        state.last_sent = now;
        state.recent.push((hash, now));
        true
    }
}

impl<S: Subscriber> Layer<S> for WhatsAppLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.message();

        let hash = {
            let mut h = DefaultHasher::new();
            message.hash(&mut h);
            h.finish()
        };

        if !self.should_send(hash) {
            return;
        }

        let target = event.metadata().target();
        let file = event.metadata().file().unwrap_or("?");
        let line = event
            .metadata()
            .line()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "?".into());
        let now_utc = chrono::Utc::now().format("%H:%M:%S UTC");

        let text = format!(
            "\u{1f6a8} Error del servidor\n{message}\n{target} ({file}:{line})\n{now_utc}"
        );

        let url = format!("{}/send-message", self.gateway_url.trim_end_matches('/'));
        let client = self.http.clone();
        let phone = self.admin_phone.clone();

        tokio::spawn(async move {
            let _ = client
                .post(&url)
                .json(&serde_json::json!({
                    "phone": phone,
                    "message": text,
                }))
                .send()
                .await;
        });
    }
}

// ── Field visitor ──

/// Collects the `message` field plus structured fields from a tracing event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl MessageVisitor {
    fn message(&self) -> String {
        if self.fields.is_empty() {
            return self.message.clone();
        }
        let extras: Vec<String> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if self.message.is_empty() {
            extras.join(", ")
        } else {
            format!("{} ({})", self.message, extras.join(", "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let val = format!("{:?}", value);
        if field.name() == "message" {
            self.message = val;
        } else {
            self.fields.push((field.name().to_string(), val));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields
                .push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .push((field.name().to_string(), value.to_string()));
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn make_layer() -> WhatsAppLayer {
        WhatsAppLayer::new("http://localhost:3001".into(), "18095550000".into())
    }

    #[test]
    fn test_first_error_reported() {
        let layer = make_layer();
        assert!(layer.should_send(111));
    }

    #[test]
    fn test_burst_is_throttled() {
        let layer = make_layer();
        assert!(layer.should_send(111));
        // Different error, but inside the minimum interval
        assert!(!layer.should_send(222));
    }

    #[test]
    fn test_repeat_error_deduped() {
        let layer = make_layer();
        assert!(layer.should_send(111));
        {
            let mut s = layer.state.lock().unwrap();
            s.last_sent = Instant::now() - MIN_INTERVAL;
        }
        assert!(!layer.should_send(111));
    }

    #[test]
    fn test_new_error_after_interval_goes_through() {
        let layer = make_layer();
        assert!(layer.should_send(111));
        {
            let mut s = layer.state.lock().unwrap();
            s.last_sent = Instant::now() - MIN_INTERVAL;
        }
        assert!(layer.should_send(222));
    }

    #[test]
    fn test_dedup_window_expires() {
        let layer = make_layer();
        assert!(layer.should_send(111));
        {
            let mut s = layer.state.lock().unwrap();
            s.last_sent = Instant::now() - MIN_INTERVAL;
            s.recent.clear();
            s.recent
                .push((111, Instant::now() - DEDUP_WINDOW - Duration::from_secs(1)));
        }
        assert!(layer.should_send(111));
    }

    #[test]
    fn test_visitor_combines_fields() {
        let mut v = MessageVisitor::default();
        v.message = "gateway unreachable".into();
        v.fields.push(("kind".into(), "appointment_created".into()));
        assert_eq!(v.message(), "gateway unreachable (kind=appointment_created)");
    }

    #[test]
    fn test_visitor_fields_only() {
        let v = MessageVisitor {
            message: String::new(),
            fields: vec![("error".into(), "timeout".into())],
        };
        assert_eq!(v.message(), "error=timeout");
    }
}

//! Push notification building, delivery and inbound classification.
//!
//! # Responsibility
//! - Build outbound messages for incident events.
//! - Resolve recipient tokens from backend user documents.
//! - Map inbound data payloads to display notifications.
//!
//! # Invariants
//! - Delivery failures are logged and never fail the calling use case.
//! - Message bodies never exceed the preview length plus the ellipsis.

use crate::backend::collections::USERS;
use crate::backend::{DocumentQuery, DocumentStore, PushMessage, PushMessaging};
use crate::model::incident::Incident;
use crate::model::user::UserRole;
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const BODY_PREVIEW_CHARS: usize = 100;
const DEFAULT_TITLE: &str = "EstateGuard";
const PUSH_TOKEN_FIELD: &str = "fcmToken";

/// Notification ready for the host to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNotification {
    pub title: String,
    pub body: String,
    pub high_priority: bool,
    pub emergency: bool,
}

impl DisplayNotification {
    fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            high_priority: false,
            emergency: false,
        }
    }
}

/// Admin alert for a newly reported incident.
pub fn incident_reported_message(token: &str, incident: &Incident) -> PushMessage {
    let mut data = BTreeMap::new();
    data.insert("type".to_string(), "incident".to_string());
    data.insert("incidentId".to_string(), incident.id.clone());
    data.insert("severity".to_string(), incident.severity.as_str().to_string());
    PushMessage {
        token: token.to_string(),
        title: format!("{} Incident Reported", incident.severity.as_str()),
        body: preview(&incident.description),
        data,
    }
}

/// Reporter notice that their incident was resolved.
pub fn incident_resolved_message(token: &str, incident: &Incident) -> PushMessage {
    let mut data = BTreeMap::new();
    data.insert("type".to_string(), "incident_resolved".to_string());
    data.insert("incidentId".to_string(), incident.id.clone());
    PushMessage {
        token: token.to_string(),
        title: "Incident Resolved".to_string(),
        body: format!(
            "Your incident report has been resolved: {}",
            preview(&incident.description)
        ),
        data,
    }
}

/// Maps an inbound push data payload to what the host should show.
pub fn classify_incoming(data: &BTreeMap<String, String>) -> DisplayNotification {
    let body = |fallback: &str| {
        data.get("body")
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };

    match data.get("type").map(String::as_str) {
        Some("incident") => {
            let severity = data.get("severity").map(String::as_str).unwrap_or("MEDIUM");
            let title = match severity {
                "CRITICAL" => "CRITICAL INCIDENT",
                "HIGH" => "HIGH PRIORITY INCIDENT",
                "MEDIUM" => "INCIDENT REPORTED",
                _ => "NEW INCIDENT",
            };
            DisplayNotification {
                high_priority: matches!(severity, "HIGH" | "CRITICAL"),
                ..DisplayNotification::new(title, body("A new incident has been reported"))
            }
        }
        Some("incident_resolved") => DisplayNotification::new(
            "Incident Resolved",
            body("Your incident report has been resolved"),
        ),
        Some("shift_reminder") => DisplayNotification::new(
            "Shift Reminder",
            body("Don't forget to clock in for your shift"),
        ),
        Some("system_update") => {
            DisplayNotification::new("System Update", body("EstateGuard has been updated"))
        }
        Some("emergency") => DisplayNotification {
            high_priority: true,
            emergency: true,
            ..DisplayNotification::new("EMERGENCY ALERT", body("Emergency situation reported"))
        },
        _ => DisplayNotification::new(
            data.get("title")
                .cloned()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body("You have a new notification"),
        ),
    }
}

fn preview(text: &str) -> String {
    let mut truncated = text.chars().take(BODY_PREVIEW_CHARS).collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Sends incident notifications to recipients registered in the backend.
#[derive(Clone)]
pub struct Notifier {
    documents: Arc<dyn DocumentStore>,
    messaging: Arc<dyn PushMessaging>,
}

impl Notifier {
    pub fn new(documents: Arc<dyn DocumentStore>, messaging: Arc<dyn PushMessaging>) -> Self {
        Self {
            documents,
            messaging,
        }
    }

    /// Alerts active admins with a registered token. Returns messages sent.
    pub fn notify_admins(&self, incident: &Incident) -> u32 {
        let query = DocumentQuery::new()
            .where_eq("role", UserRole::Admin.as_str())
            .where_eq("isActive", true);
        let admins = match self.documents.query(USERS, &query) {
            Ok(admins) => admins,
            Err(err) => {
                warn!(
                    "event=notify_admins module=notify status=error error_code={}",
                    err.code
                );
                return 0;
            }
        };

        let mut sent = 0;
        for admin in admins {
            let Some(token) = push_token(&admin.data) else {
                continue;
            };
            if self.deliver(&incident_reported_message(token, incident)) {
                sent += 1;
            }
        }
        info!(
            "event=notify_admins module=notify status=ok severity={} sent={}",
            incident.severity.as_str(),
            sent
        );
        sent
    }

    /// Tells the reporter their incident was resolved.
    pub fn notify_resolved(&self, incident: &Incident) -> bool {
        let token = match self.documents.get_document(USERS, &incident.user_id) {
            Ok(Some(document)) => push_token(&document).map(str::to_string),
            Ok(None) => None,
            Err(err) => {
                warn!(
                    "event=notify_resolved module=notify status=error error_code={}",
                    err.code
                );
                return false;
            }
        };
        match token {
            Some(token) => self.deliver(&incident_resolved_message(&token, incident)),
            None => false,
        }
    }

    fn deliver(&self, message: &PushMessage) -> bool {
        match self.messaging.send(message) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "event=push_send module=notify status=error error_code={} retryable={}",
                    err.code, err.retryable
                );
                false
            }
        }
    }
}

fn push_token(document: &Value) -> Option<&str> {
    document
        .get(PUSH_TOKEN_FIELD)
        .and_then(Value::as_str)
        .filter(|token| !token.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::{classify_incoming, incident_reported_message, incident_resolved_message};
    use crate::model::incident::{Incident, IncidentSeverity};
    use std::collections::BTreeMap;

    fn payload(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn reported_message_truncates_description() {
        let mut incident = Incident::new("inc-1", "guard-1", "x".repeat(150), 1_000);
        incident.severity = IncidentSeverity::Critical;
        let message = incident_reported_message("token-a", &incident);
        assert_eq!(message.title, "CRITICAL Incident Reported");
        assert_eq!(message.body.chars().count(), 103);
        assert!(message.body.ends_with("..."));
        assert_eq!(message.data.get("type").map(String::as_str), Some("incident"));
        assert_eq!(message.data.get("severity").map(String::as_str), Some("CRITICAL"));
    }

    #[test]
    fn resolved_message_targets_reporter() {
        let incident = Incident::new("inc-2", "guard-1", "Gate left open", 1_000);
        let message = incident_resolved_message("token-b", &incident);
        assert_eq!(message.token, "token-b");
        assert_eq!(message.title, "Incident Resolved");
        assert_eq!(
            message.body,
            "Your incident report has been resolved: Gate left open..."
        );
    }

    #[test]
    fn classify_incident_by_severity() {
        let critical = classify_incoming(&payload(&[("type", "incident"), ("severity", "CRITICAL")]));
        assert_eq!(critical.title, "CRITICAL INCIDENT");
        assert!(critical.high_priority);
        assert!(!critical.emergency);

        let low = classify_incoming(&payload(&[("type", "incident"), ("severity", "LOW")]));
        assert_eq!(low.title, "NEW INCIDENT");
        assert!(!low.high_priority);

        let missing = classify_incoming(&payload(&[("type", "incident")]));
        assert_eq!(missing.title, "INCIDENT REPORTED");
    }

    #[test]
    fn classify_emergency_is_max_priority() {
        let notification = classify_incoming(&payload(&[("type", "emergency"), ("body", "Fire")]));
        assert!(notification.emergency);
        assert!(notification.high_priority);
        assert_eq!(notification.body, "Fire");
    }

    #[test]
    fn classify_unknown_type_uses_payload_title() {
        let notification = classify_incoming(&payload(&[("title", "Gate code changed")]));
        assert_eq!(notification.title, "Gate code changed");
        assert_eq!(notification.body, "You have a new notification");

        let bare = classify_incoming(&BTreeMap::new());
        assert_eq!(bare.title, "EstateGuard");
    }
}

//! Inbound notification payloads from the platform listener.
//!
//! The listener bridge hands over whatever text fields the notification
//! carried. Field order matters: the parser is first-match-wins, so the more
//! specific fields (title, body) are placed ahead of the summaries and
//! grouped messages.

use serde::Deserialize;

// ---

/// One message of a grouped or bundled notification.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupedMessage {
    pub title: Option<String>,
    pub text: Option<String>,
}

/// Raw notification as forwarded by the listener.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    // ---
    /// Source application id.
    pub app: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub big_text: Option<String>,
    pub sub_text: Option<String>,
    pub summary_text: Option<String>,
    pub extra_info_text: Option<String>,
    pub ticker_text: Option<String>,
    pub extras_text: Option<String>,
    #[serde(default)]
    pub grouped_messages: Vec<GroupedMessage>,
}

impl NotificationPayload {
    // ---
    pub fn app_id(&self) -> &str {
        self.app.as_deref().unwrap_or("")
    }

    /// Space-join every non-empty text field in priority order.
    pub fn assemble_text(&self) -> String {
        // ---
        let fields = [
            &self.title,
            &self.text,
            &self.big_text,
            &self.sub_text,
            &self.summary_text,
            &self.extra_info_text,
            &self.ticker_text,
            &self.extras_text,
        ];

        let grouped = self
            .grouped_messages
            .iter()
            .flat_map(|msg| [&msg.title, &msg.text]);

        fields
            .into_iter()
            .chain(grouped)
            .filter_map(|field| field.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Wrapper used by headless listener bridges.
///
/// Some bridges serialize the notification to a JSON string before handing
/// it over, others pass the object through.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NotificationField {
    Object(NotificationPayload),
    Encoded(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationEnvelope {
    pub notification: Option<NotificationField>,
}

impl NotificationEnvelope {
    /// Unwrap the payload. `None` when absent or the encoded form does not parse.
    pub fn into_payload(self) -> Option<NotificationPayload> {
        // ---
        match self.notification? {
            NotificationField::Object(payload) => Some(payload),
            NotificationField::Encoded(raw) => match serde_json::from_str(&raw) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    tracing::debug!("Discarding unparsable notification string: {}", e);
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_field_order_and_grouped_messages() {
        // ---
        let payload: NotificationPayload = serde_json::from_str(
            r#"{
                "app": "com.camdiab.fx_alert.mmoll",
                "tickerText": "ticker",
                "title": "CamAPS FX",
                "bigText": "big",
                "text": "7.2 mmol/L",
                "subText": "",
                "groupedMessages": [{"title": "g1", "text": "t1"}, {"text": "t2"}]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.app_id(), "com.camdiab.fx_alert.mmoll");
        assert_eq!(
            payload.assemble_text(),
            "CamAPS FX 7.2 mmol/L big ticker g1 t1 t2"
        );
    }

    #[test]
    fn test_empty_payload_assembles_to_empty() {
        // ---
        let payload = NotificationPayload::default();
        assert_eq!(payload.assemble_text(), "");
        assert_eq!(payload.app_id(), "");
    }

    #[test]
    fn test_envelope_object_and_encoded() {
        // ---
        let object: NotificationEnvelope =
            serde_json::from_str(r#"{"notification": {"app": "a", "title": "t"}}"#).unwrap();
        assert_eq!(object.into_payload().unwrap().app_id(), "a");

        let encoded: NotificationEnvelope =
            serde_json::from_str(r#"{"notification": "{\"app\":\"b\",\"text\":\"x\"}"}"#)
                .unwrap();
        assert_eq!(encoded.into_payload().unwrap().app_id(), "b");

        let broken: NotificationEnvelope =
            serde_json::from_str(r#"{"notification": "not json"}"#).unwrap();
        assert!(broken.into_payload().is_none());

        let missing: NotificationEnvelope = serde_json::from_str(r#"{}"#).unwrap();
        assert!(missing.into_payload().is_none());
    }
}

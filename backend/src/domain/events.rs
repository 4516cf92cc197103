//! Domain events exchanged between services through the broker.
//!
//! Each event type carries a stable type tag. The tag doubles as the routing
//! key on the topic exchange, so renaming one is a wire-breaking change.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DiaryId, FamilyId, TraceId, UserId};

/// Routing key of [`DiaryCreatedEvent`].
pub const DIARY_CREATED: &str = "diary.created";
/// Routing key of [`MailSendEvent`].
pub const MAIL_SEND: &str = "mail.send";

/// A payload with a stable type identifier.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync {
    /// Type tag used as the routing key.
    const EVENT_TYPE: &'static str;
}

/// Emitted once a diary entry has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryCreatedEvent {
    pub diary_id: DiaryId,
    pub user_id: UserId,
    pub family_id: FamilyId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for DiaryCreatedEvent {
    const EVENT_TYPE: &'static str = DIARY_CREATED;
}

/// Command asking the mail service to render and send one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSendEvent {
    pub template_id: String,
    pub locale: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
    /// Overrides the template subject when present and non-blank.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub payload: BTreeMap<String, serde_json::Value>,
}

impl DomainEvent for MailSendEvent {
    const EVENT_TYPE: &'static str = MAIL_SEND;
}

/// Broker-neutral envelope handed to publishers and stored in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Type tag of the wrapped event; used as the routing key.
    pub event_type: String,
    /// JSON encoding of the event.
    pub payload: serde_json::Value,
    /// Trace identifier propagated as a message header.
    pub trace_id: Option<Uuid>,
}

impl EventEnvelope {
    /// Wrap a typed event, capturing the trace identifier in scope.
    ///
    /// # Examples
    /// ```
    /// use diary_backend::domain::events::{EventEnvelope, MailSendEvent, MAIL_SEND};
    ///
    /// let event = MailSendEvent {
    ///     template_id: "welcome".to_owned(),
    ///     locale: "ja".to_owned(),
    ///     to: vec!["hanako@example.com".to_owned()],
    ///     cc: Vec::new(),
    ///     bcc: Vec::new(),
    ///     subject: None,
    ///     reply_to: None,
    ///     headers: Default::default(),
    ///     payload: Default::default(),
    /// };
    /// let envelope = EventEnvelope::from_event(&event).expect("serialisable");
    /// assert_eq!(envelope.event_type, MAIL_SEND);
    /// ```
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: E::EVENT_TYPE.to_owned(),
            payload: serde_json::to_value(event)?,
            trace_id: TraceId::current().map(|id| *id.as_uuid()),
        })
    }

    /// Encode the payload as the UTF-8 JSON message body.
    pub fn body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.payload)
    }
}

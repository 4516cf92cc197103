//! Broker topology shared by publishers and consumers.
//!
//! | Service         | Exchange        | Queue                    | Routing keys    |
//! |-----------------|-----------------|--------------------------|-----------------|
//! | diary           | `diary.events`  | (publisher)              | `diary.created` |
//! | diary-analyzer  | `diary.events`  | `diary-analyzer.analyze` | `diary.created` |
//! | user-context    | `mail.commands` | (publisher)              | `mail.send`     |
//! | mail-service    | `mail.commands` | `mail-service.send`      | `mail.send`     |
//!
//! All exchanges are durable topic exchanges. Consumer queues are quorum
//! queues so redeliveries carry `x-delivery-count`.

use crate::domain::events::{DIARY_CREATED, MAIL_SEND};

/// Exchange carrying diary lifecycle events.
pub const DIARY_EVENTS_EXCHANGE: &str = "diary.events";
/// Exchange carrying mail commands.
pub const MAIL_COMMANDS_EXCHANGE: &str = "mail.commands";
/// Queue consumed by the diary analyzer.
pub const DIARY_ANALYZER_QUEUE: &str = "diary-analyzer.analyze";
/// Queue consumed by the mail service.
pub const MAIL_SERVICE_QUEUE: &str = "mail-service.send";

/// Suffix of the fanout exchange that receives dead-lettered messages.
const DEAD_LETTER_EXCHANGE_SUFFIX: &str = ".dlx";
/// Suffix of the queue that parks dead-lettered messages.
const DEAD_LETTER_QUEUE_SUFFIX: &str = ".dead-letter";

/// Exchange, queue, and bindings a consumer declares before consuming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerTopology {
    pub exchange: String,
    pub queue: String,
    pub routing_keys: Vec<String>,
    /// Declare `<exchange>.dlx` and `<queue>.dead-letter` and route
    /// rejected messages there.
    pub dead_letter: bool,
}

impl ConsumerTopology {
    /// Topology of the diary analyzer.
    #[must_use]
    pub fn diary_analyzer() -> Self {
        Self {
            exchange: DIARY_EVENTS_EXCHANGE.to_owned(),
            queue: DIARY_ANALYZER_QUEUE.to_owned(),
            routing_keys: vec![DIARY_CREATED.to_owned()],
            dead_letter: true,
        }
    }

    /// Topology of the mail service.
    #[must_use]
    pub fn mail_service() -> Self {
        Self {
            exchange: MAIL_COMMANDS_EXCHANGE.to_owned(),
            queue: MAIL_SERVICE_QUEUE.to_owned(),
            routing_keys: vec![MAIL_SEND.to_owned()],
            dead_letter: true,
        }
    }

    /// Override the queue name, keeping exchange and bindings.
    #[must_use]
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Toggle dead-letter declaration.
    #[must_use]
    pub fn with_dead_letter(mut self, enabled: bool) -> Self {
        self.dead_letter = enabled;
        self
    }

    /// Name of the dead-letter exchange.
    #[must_use]
    pub fn dead_letter_exchange(&self) -> String {
        format!("{}{DEAD_LETTER_EXCHANGE_SUFFIX}", self.exchange)
    }

    /// Name of the dead-letter queue.
    #[must_use]
    pub fn dead_letter_queue(&self) -> String {
        format!("{}{DEAD_LETTER_QUEUE_SUFFIX}", self.queue)
    }
}

//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driving ports (`*Command`) are implemented by domain services and called
//! by inbound adapters. Driven ports are implemented by outbound adapters;
//! their error enums mark which failures are worth retrying.

mod macros;
pub(crate) use macros::define_port_error;

mod diary_analysis_command;
mod diary_analysis_repository;
mod diary_command;
mod diary_transaction;
mod event_publisher;
mod mail_command;
mod mail_sender;
mod outbox_repository;
mod proofreading_gateway;

#[cfg(test)]
pub use diary_analysis_command::MockDiaryAnalysisCommand;
pub use diary_analysis_command::DiaryAnalysisCommand;
#[cfg(test)]
pub use diary_analysis_repository::MockDiaryAnalysisRepository;
pub use diary_analysis_repository::{DiaryAnalysisRepository, DiaryAnalysisRepositoryError};
#[cfg(test)]
pub use diary_command::MockDiaryCommand;
pub use diary_command::{CreateDiaryRequest, CreateDiaryResponse, DiaryCommand};
#[cfg(test)]
pub use diary_transaction::{MockDiaryTransactionManager, MockDiaryUnitOfWork};
pub use diary_transaction::{DiaryRepositoryError, DiaryTransactionManager, DiaryUnitOfWork};
#[cfg(test)]
pub use event_publisher::MockEventPublisher;
pub use event_publisher::{EventPublisher, EventPublisherError};
#[cfg(test)]
pub use mail_command::MockMailCommand;
pub use mail_command::MailCommand;
#[cfg(test)]
pub use mail_sender::MockMailSender;
pub use mail_sender::{MailSender, MailSenderError};
#[cfg(test)]
pub use outbox_repository::MockOutboxRepository;
pub use outbox_repository::{OutboxRepository, OutboxRepositoryError};
#[cfg(test)]
pub use proofreading_gateway::MockProofreadingGateway;
pub use proofreading_gateway::{
    ProofreadingGateway, ProofreadingGatewayError, ProofreadingSuggestion,
};

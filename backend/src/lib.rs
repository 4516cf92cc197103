//! Family diary event backend.
//!
//! Workers exchange JSON events over an AMQP topic exchange:
//! `diary-analyzer` scores new diary entries, `mail-service` renders and
//! sends templated mail, and `outbox-relay` publishes events written
//! transactionally by the diary use case.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod shutdown;
pub mod telemetry;
pub mod topology;

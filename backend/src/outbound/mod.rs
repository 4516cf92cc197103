//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **broker**: AMQP connection, topology declaration and event publisher
//! - **persistence**: PostgreSQL repositories using Diesel
//! - **proofreading**: HTTP client for the proofreading service
//! - **smtp**: mail transport
//!
//! Adapters translate between domain types and wire or storage formats and
//! contain no business logic.

pub mod broker;
pub mod persistence;
pub mod proofreading;
pub mod smtp;

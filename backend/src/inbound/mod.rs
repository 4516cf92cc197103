//! Inbound adapters that translate broker deliveries into domain service
//! calls while keeping transport details at the edge.
//!
//! Message consumers live under [`messaging`].

pub mod messaging;

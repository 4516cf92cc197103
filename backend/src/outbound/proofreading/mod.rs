//! Proofreading service adapter.

mod dto;
mod http_gateway;

pub use http_gateway::{DEFAULT_PROOFREADING_ENDPOINT, HttpProofreadingGateway};

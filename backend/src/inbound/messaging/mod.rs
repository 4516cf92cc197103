//! Message consumption: decode, dispatch, settle.
//!
//! [`MessageConsumer`] owns the broker channel and the worker task.
//! Each delivery is converted into a broker-neutral [`InboundDelivery`] and
//! run through [`dispatch`], which calls an [`EventHandler`] and settles the
//! delivery exactly once.

mod consumer;
mod diary_analysis_handler;
mod dispatcher;
mod handler;
mod headers;
mod mail_handler;

pub use consumer::{
    ConsumerError, ConsumerOptions, ConsumerState, DEFAULT_DRAIN_TIMEOUT, MessageConsumer,
    WorkerExit,
};
pub use diary_analysis_handler::DiaryAnalysisHandler;
pub use dispatcher::{
    DeliveryAcker, InboundDelivery, RedeliveryPolicy, Settlement, SettlementError, dispatch,
};
pub use handler::EventHandler;
pub use mail_handler::MailHandler;

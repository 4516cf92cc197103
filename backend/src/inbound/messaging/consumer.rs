//! AMQP consumer lifecycle: `Created → Running → Stopped`.
//!
//! [`MessageConsumer::start`] declares topology, limits the channel to one
//! unacknowledged delivery, and spawns a single worker that dispatches
//! deliveries sequentially. [`MessageConsumer::stop`] cancels the worker,
//! waits up to the drain timeout for an in-flight handler, then closes the
//! consumer's channel. The shared connection is left open for its owner.
//! A worker whose delivery stream ends cancels the token passed to `start`
//! so the process can exit and be restarted.

use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions};
use lapin::types::FieldTable;
use lapin::Channel;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::outbound::broker::{BrokerConnection, BrokerError, declare_consumer_topology};
use crate::topology::ConsumerTopology;

use super::dispatcher::{
    DeliveryAcker, InboundDelivery, RedeliveryPolicy, SettlementError, dispatch,
};
use super::{EventHandler, headers};

const PREFETCH_COUNT: u16 = 1;
const CHANNEL_CLOSE_REPLY_CODE: u16 = 200;

/// Default bound on waiting for an in-flight handler during [`MessageConsumer::stop`].
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of a [`MessageConsumer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Created,
    Running,
    Stopped,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// Errors raised by consumer lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    /// The operation is not valid in the current lifecycle state.
    #[error("consumer is {actual}, expected {expected}")]
    InvalidState {
        expected: ConsumerState,
        actual: ConsumerState,
    },
    /// Broker setup or teardown failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// The worker stopped consuming before it was asked to.
    #[error("consumer worker exited unexpectedly: {0}")]
    WorkerExited(WorkerExit),
}

/// Why a worker loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Cancellation was observed between deliveries.
    Cancelled,
    /// The broker ended the delivery stream.
    StreamClosed,
    /// The delivery stream yielded an error.
    StreamFailed(String),
    /// The worker task panicked.
    Panicked(String),
}

impl WorkerExit {
    /// Whether the worker stopped on request.
    #[must_use]
    pub const fn is_requested(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::StreamClosed => f.write_str("delivery stream closed"),
            Self::StreamFailed(message) => write!(f, "delivery stream failed: {message}"),
            Self::Panicked(message) => write!(f, "worker panicked: {message}"),
        }
    }
}

/// Tuning for a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Tag reported to the broker for this consumer.
    pub consumer_tag: String,
    pub redelivery: RedeliveryPolicy,
    pub drain_timeout: Duration,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            consumer_tag: String::new(),
            redelivery: RedeliveryPolicy::unbounded(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// A spawned worker loop and the token that stops it.
struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<WorkerExit>,
}

impl Worker {
    /// Spawn a worker over `deliveries`. `shutdown` is cancelled if the
    /// stream ends or fails, so the owner of the token wakes up.
    fn spawn<H, S, A, E>(
        deliveries: S,
        handler: Arc<H>,
        policy: RedeliveryPolicy,
        shutdown: &CancellationToken,
        queue: String,
    ) -> Self
    where
        H: EventHandler + ?Sized + 'static,
        S: Stream<Item = Result<(InboundDelivery, A), E>> + Send + 'static,
        A: DeliveryAcker + 'static,
        E: fmt::Display + Send + 'static,
    {
        let cancel = shutdown.child_token();
        let handle = tokio::spawn(run_worker(
            deliveries,
            handler,
            policy,
            cancel.clone(),
            shutdown.clone(),
            queue,
        ));
        Self { cancel, handle }
    }

    /// Cancel the loop and wait up to `timeout` for the in-flight delivery.
    ///
    /// Returns `None` when the worker had to be aborted.
    async fn drain(mut self, timeout: Duration) -> Option<WorkerExit> {
        self.cancel.cancel();
        match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(Ok(exit)) => Some(exit),
            Ok(Err(err)) => Some(WorkerExit::Panicked(err.to_string())),
            Err(_) => {
                self.handle.abort();
                None
            }
        }
    }
}

enum Lifecycle<C> {
    Created,
    Running { channel: C, worker: Worker },
    Stopped,
}

impl<C> Lifecycle<C> {
    fn state(&self) -> ConsumerState {
        match self {
            Self::Created => ConsumerState::Created,
            Self::Running { .. } => ConsumerState::Running,
            Self::Stopped => ConsumerState::Stopped,
        }
    }

    fn ensure(&self, expected: ConsumerState) -> Result<(), ConsumerError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(ConsumerError::InvalidState { expected, actual })
        }
    }

    /// Move a running lifecycle to `Stopped`, handing back its parts.
    fn take_running(&mut self) -> Result<(C, Worker), ConsumerError> {
        self.ensure(ConsumerState::Running)?;
        match std::mem::replace(self, Self::Stopped) {
            Self::Running { channel, worker } => Ok((channel, worker)),
            other => {
                let actual = other.state();
                *self = other;
                Err(ConsumerError::InvalidState {
                    expected: ConsumerState::Running,
                    actual,
                })
            }
        }
    }
}

/// Queue consumer that feeds deliveries to one [`EventHandler`].
pub struct MessageConsumer<H> {
    connection: BrokerConnection,
    topology: ConsumerTopology,
    handler: Arc<H>,
    options: ConsumerOptions,
    lifecycle: Mutex<Lifecycle<Channel>>,
}

impl<H> MessageConsumer<H>
where
    H: EventHandler + 'static,
{
    /// Create a consumer in the `Created` state.
    pub fn new(
        connection: BrokerConnection,
        topology: ConsumerTopology,
        handler: Arc<H>,
        options: ConsumerOptions,
    ) -> Self {
        Self {
            connection,
            topology,
            handler,
            options,
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConsumerState {
        self.lifecycle.lock().await.state()
    }

    /// Declare topology and start the worker.
    ///
    /// Returns once the worker is spawned. The worker stops when `cancel`
    /// (or [`MessageConsumer::stop`]) fires. If the broker ends the delivery
    /// stream first, the worker cancels `cancel` itself and
    /// [`MessageConsumer::stop`] reports [`ConsumerError::WorkerExited`].
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidState`] unless the consumer is
    /// `Created`, or [`ConsumerError::Broker`] when setup fails.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), ConsumerError> {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.ensure(ConsumerState::Created)?;

        let channel = self.connection.create_channel().await?;
        declare_consumer_topology(&channel, &self.topology).await?;
        channel
            .basic_qos(PREFETCH_COUNT, BasicQosOptions::default())
            .await
            .map_err(channel_error)?;
        let deliveries = channel
            .basic_consume(
                &self.topology.queue,
                &self.options.consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    exclusive: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(channel_error)?;

        let worker = Worker::spawn(
            deliveries.map(|delivery| delivery.map(split_delivery)),
            Arc::clone(&self.handler),
            self.options.redelivery,
            cancel,
            self.topology.queue.clone(),
        );

        tracing::info!(
            queue = %self.topology.queue,
            prefetch = PREFETCH_COUNT,
            max_deliveries = ?self.options.redelivery.max_deliveries,
            "consumer started"
        );
        *lifecycle = Lifecycle::Running { channel, worker };
        Ok(())
    }

    /// Stop the worker, draining the in-flight delivery, and close the
    /// channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::InvalidState`] unless the consumer is
    /// `Running`, [`ConsumerError::Broker`] when the channel close fails, or
    /// [`ConsumerError::WorkerExited`] when the worker had already stopped
    /// consuming on its own.
    pub async fn stop(&self) -> Result<(), ConsumerError> {
        let (channel, worker) = self.lifecycle.lock().await.take_running()?;

        let exit = worker.drain(self.options.drain_timeout).await;
        if exit.is_none() {
            tracing::warn!(
                queue = %self.topology.queue,
                drain_timeout_ms = u64::try_from(self.options.drain_timeout.as_millis()).unwrap_or(u64::MAX),
                "in-flight delivery did not finish before drain timeout; aborted worker"
            );
        }

        if channel.status().connected() {
            channel
                .close(CHANNEL_CLOSE_REPLY_CODE, "consumer stopped")
                .await
                .map_err(|err| BrokerError::Close {
                    message: err.to_string(),
                })?;
        }
        tracing::info!(queue = %self.topology.queue, "consumer stopped");

        match exit {
            Some(exit) if !exit.is_requested() => Err(ConsumerError::WorkerExited(exit)),
            _ => Ok(()),
        }
    }
}

fn channel_error(err: lapin::Error) -> BrokerError {
    BrokerError::Channel {
        message: err.to_string(),
    }
}

/// Dispatch deliveries one at a time until `cancel` fires or the stream
/// ends. Cancellation is only observed between deliveries, so an in-flight
/// handler always runs to completion unless the task is aborted.
async fn run_worker<H, S, A, E>(
    deliveries: S,
    handler: Arc<H>,
    policy: RedeliveryPolicy,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    queue: String,
) -> WorkerExit
where
    H: EventHandler + ?Sized,
    S: Stream<Item = Result<(InboundDelivery, A), E>>,
    A: DeliveryAcker,
    E: fmt::Display,
{
    let mut deliveries = pin!(deliveries);
    let exit = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(%queue, "consumer worker cancelled");
                return WorkerExit::Cancelled;
            }
            next = deliveries.next() => next,
        };

        match next {
            Some(Ok((inbound, acker))) => {
                dispatch(handler.as_ref(), inbound, &acker, policy).await;
            }
            Some(Err(err)) => {
                tracing::error!(%queue, error = %err, "delivery stream failed");
                break WorkerExit::StreamFailed(err.to_string());
            }
            None => {
                tracing::error!(%queue, "delivery stream closed by broker");
                break WorkerExit::StreamClosed;
            }
        }
    };
    shutdown.cancel();
    exit
}

fn split_delivery(delivery: Delivery) -> (InboundDelivery, Acker) {
    let headers = delivery.properties.headers().as_ref();
    let inbound = InboundDelivery {
        routing_key: delivery.routing_key.as_str().to_owned(),
        delivery_count: headers::delivery_count(headers, delivery.redelivered),
        trace_id: headers::trace_id(headers),
        body: delivery.data,
    };
    (inbound, delivery.acker)
}

#[async_trait]
impl DeliveryAcker for Acker {
    async fn ack(&self) -> Result<(), SettlementError> {
        Acker::ack(self, BasicAckOptions::default())
            .await
            .map_err(|err| SettlementError::new(err.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), SettlementError> {
        Acker::nack(
            self,
            BasicNackOptions {
                requeue,
                multiple: false,
            },
        )
        .await
        .map_err(|err| SettlementError::new(err.to_string()))
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;

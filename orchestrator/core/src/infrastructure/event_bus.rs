// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Run Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Subscribers follow one job (`logs:<id>`, `error:<id>`, `done:<id>`) or
// watch every job. Events are not persisted; a subscriber only sees what is
// published after it subscribes.

use crate::domain::events::RunEvent;
use crate::domain::job::JobId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to run events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RunEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a run event to all subscribers
    pub fn publish(&self, event: RunEvent) {
        debug!(channel = %event.channel(), "Publishing event");

        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to events of every job
    pub fn subscribe(&self) -> EventReceiver {
        let receiver = self.sender.subscribe();
        EventReceiver { receiver }
    }

    /// Subscribe and filter for a single job
    pub fn subscribe_job(&self, job_id: JobId) -> JobEventReceiver {
        let receiver = self.sender.subscribe();
        JobEventReceiver { receiver, job_id }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all run events
pub struct EventReceiver {
    receiver: broadcast::Receiver<RunEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<RunEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<RunEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver for one job's events (filtered)
pub struct JobEventReceiver {
    receiver: broadcast::Receiver<RunEvent>,
    job_id: JobId,
}

impl JobEventReceiver {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Receive the next event for this job, skipping other jobs
    pub async fn recv(&mut self) -> Result<RunEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.job_id() == &self.job_id {
                return Ok(event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        event_bus.publish(RunEvent::log(JobId::new("srv-1"), "TASK [connect]"));

        match receiver.recv().await.unwrap() {
            RunEvent::Log { job_id, line, .. } => {
                assert_eq!(job_id.as_str(), "srv-1");
                assert_eq!(line, "TASK [connect]");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_job_event_filtering() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_job(JobId::new("app-1"));

        event_bus.publish(RunEvent::log(JobId::new("app-2"), "TASK [other]"));
        event_bus.publish(RunEvent::done(JobId::new("app-1")));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.channel(), "done:app-1");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe_job(JobId::new("t1"));

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish(RunEvent::error(JobId::new("t1"), Some(2), "exit status 2"));

        assert!(receiver1.recv().await.unwrap().is_terminal());
        assert!(receiver2.recv().await.unwrap().is_terminal());
    }

    #[test]
    fn test_try_recv_empty() {
        let event_bus = EventBus::new(4);
        let mut receiver = event_bus.subscribe();
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}

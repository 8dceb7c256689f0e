/// Domain events
///
/// Best-effort notifications about identity changes. Publishing hands the
/// event to a background task through a bounded queue and returns
/// immediately. A full queue drops the event. Delivery failures are logged
/// by the task and never reach the request that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::error::EventError;

/// Events waiting for delivery beyond this are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Activity {
        id: Uuid,
        event: String,
        created_at: DateTime<Utc>,
    },
    Notification {
        id: Uuid,
        email: String,
        event: String,
        created_at: DateTime<Utc>,
    },
    Verification {
        id: Uuid,
        profile_picture: String,
    },
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::Activity { .. } => "user.activity",
            DomainEvent::Notification { .. } => "user.notification",
            DomainEvent::Verification { .. } => "user.verification",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            DomainEvent::Activity {
                id,
                event,
                created_at,
            } => json!({ "id": id, "event": event, "created_at": created_at }),
            DomainEvent::Notification {
                id,
                email,
                event,
                created_at,
            } => json!({ "id": id, "email": email, "event": event, "created_at": created_at }),
            DomainEvent::Verification {
                id,
                profile_picture,
            } => json!({ "id": id, "profile_picture": profile_picture }),
        }
    }
}

/// Where published events end up.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, topic: &str, payload: &Value) -> Result<(), EventError>;
}

#[derive(Serialize)]
struct ProduceRequest<'a> {
    records: [ProduceRecord<'a>; 1],
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    value: &'a Value,
}

/// Posts each event to an HTTP event-log proxy at
/// `{base_url}/topics/{topic}`. The client's timeout bounds every delivery.
#[derive(Clone)]
pub struct HttpEventSink {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpEventSink {
    pub fn new(base_url: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
        }
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn deliver(&self, topic: &str, payload: &Value) -> Result<(), EventError> {
        let url = format!("{}/topics/{}", self.base_url.trim_end_matches('/'), topic);
        let request = ProduceRequest {
            records: [ProduceRecord { value: payload }],
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EventError::SendFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EventError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no event log is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

#[async_trait]
impl EventSink for LogEventSink {
    async fn deliver(&self, topic: &str, payload: &Value) -> Result<(), EventError> {
        tracing::info!(topic = topic, payload = %payload, "Domain event");
        Ok(())
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    sender: mpsc::Sender<DomainEvent>,
}

impl EventPublisher {
    /// Start the dispatch task with [`DEFAULT_QUEUE_CAPACITY`]. Must be
    /// called inside a tokio runtime.
    pub fn spawn(sink: Arc<dyn EventSink>) -> Self {
        Self::with_capacity(sink, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<DomainEvent>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let topic = event.topic();
                if let Err(e) = sink.deliver(topic, &event.payload()).await {
                    tracing::warn!(topic = topic, error = %e, "Dropping domain event");
                }
            }
        });

        Self { sender }
    }

    /// Queue `event` for delivery. Returns false if it was dropped.
    pub fn publish(&self, event: DomainEvent) -> bool {
        let topic = event.topic();
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(topic = topic, "Event queue full, dropping domain event");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(topic = topic, "Event dispatcher stopped, dropping domain event");
                false
            }
        }
    }
}

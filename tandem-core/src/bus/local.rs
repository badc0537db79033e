//! In-process bus implementation
//!
//! Topics are tokio broadcast channels keyed by name; services are handler
//! closures in a shared registry. Every clone of a [`LocalBus`] (and every
//! handle made with [`LocalBus::named`]) sees the same topics and services.

use crate::bus::error::{BusError, validate_name};
use crate::bus::message::BusMessage;
use crate::bus::traits::{Bus, HandlerFuture, ServiceHandle, SubscriptionHandle};
use crate::error::{Result, TandemError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default per-subscriber queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Type-erased service handler
type ServiceHandler = Arc<dyn Fn(serde_json::Value) -> HandlerFuture<serde_json::Value> + Send + Sync>;

/// Local bus shared by every node in the process
#[derive(Clone)]
pub struct LocalBus {
    node_name: String,
    queue_depth: usize,
    topics: Arc<RwLock<HashMap<String, broadcast::Sender<BusMessage>>>>,
    services: Arc<RwLock<HashMap<String, ServiceHandler>>>,
}

impl fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBus")
            .field("node_name", &self.node_name)
            .field("queue_depth", &self.queue_depth)
            .finish_non_exhaustive()
    }
}

impl LocalBus {
    /// Create a new local bus with the default queue depth
    pub fn new(node_name: impl Into<String>) -> Self {
        Self::with_queue_depth(node_name, DEFAULT_QUEUE_DEPTH)
    }

    /// Create a new local bus; each subscriber buffers at most `queue_depth`
    /// messages before the oldest are dropped
    pub fn with_queue_depth(node_name: impl Into<String>, queue_depth: usize) -> Self {
        Self {
            node_name: node_name.into(),
            queue_depth: queue_depth.max(1),
            topics: Arc::new(RwLock::new(HashMap::new())),
            services: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Handle onto the same bus that publishes under a different node name
    pub fn named(&self, node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            ..self.clone()
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    async fn get_or_create_topic(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        let mut topics = self.topics.write().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.queue_depth).0)
            .clone()
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn publish<M>(&self, topic: &str, message: M) -> Result<()>
    where
        M: Serialize + Send + Sync + 'static,
    {
        validate_name(topic)?;

        let content = serde_json::to_value(message).map_err(BusError::from)?;
        let envelope = BusMessage::new(topic, content, self.node_name.as_str());
        let sender = self.get_or_create_topic(topic).await;

        // No receivers is not an error: the message is simply dropped
        if sender.send(envelope).is_err() {
            tracing::trace!(topic, "published with no subscribers");
        }
        Ok(())
    }

    async fn subscribe<M, F>(&self, topic: &str, handler: F) -> Result<SubscriptionHandle>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        F: Fn(M) -> HandlerFuture<()> + Send + Sync + 'static,
    {
        validate_name(topic)?;

        let mut receiver = self.get_or_create_topic(topic).await.subscribe();
        let cancel = CancellationToken::new();
        let subscription_id = Uuid::new_v4();

        let task_cancel = cancel.clone();
        let task_topic = topic.to_string();
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    received = receiver.recv() => received,
                };

                match received {
                    Ok(BusMessage { topic, content, from }) => match serde_json::from_value::<M>(content) {
                        Ok(typed) => {
                            if let Err(e) = handler(typed).await {
                                tracing::warn!(topic = %topic, %from, "subscription handler failed: {}", e);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                "Failed to deserialize message from {} for topic {}: {}",
                                from,
                                topic,
                                e
                            );
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %task_topic, skipped, "subscriber lagged, dropped oldest messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!(topic = %task_topic, "subscription closed");
        });

        Ok(SubscriptionHandle::new(subscription_id, topic.to_string(), cancel))
    }

    async fn advertise<Req, Resp, F>(&self, service: &str, handler: F) -> Result<ServiceHandle>
    where
        Req: DeserializeOwned + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
        F: Fn(Req) -> HandlerFuture<Resp> + Send + Sync + 'static,
    {
        validate_name(service)?;

        let handler = Arc::new(handler);
        let erased: ServiceHandler = Arc::new(move |request: serde_json::Value| {
            let handler = handler.clone();
            Box::pin(async move {
                let typed = serde_json::from_value::<Req>(request).map_err(BusError::from)?;
                let response = handler(typed).await?;
                Ok::<_, TandemError>(serde_json::to_value(response).map_err(BusError::from)?)
            }) as HandlerFuture<serde_json::Value>
        });

        let mut services = self.services.write().await;
        if services.contains_key(service) {
            return Err(BusError::DuplicateService(service.to_string()).into());
        }

        services.insert(service.to_string(), erased);
        tracing::debug!(service, node = %self.node_name, "service advertised");

        Ok(ServiceHandle::new(service.to_string()))
    }

    async fn service_ready(&self, service: &str) -> bool {
        self.services.read().await.contains_key(service)
    }

    async fn call<Req, Resp>(&self, service: &str, request: Req) -> Result<Resp>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        validate_name(service)?;

        let handler = {
            let services = self.services.read().await;
            services
                .get(service)
                .cloned()
                .ok_or_else(|| BusError::ServiceNotFound(service.to_string()))?
        };

        let request = serde_json::to_value(request).map_err(BusError::from)?;
        let response = handler(request).await.map_err(|e| BusError::Handler {
            service: service.to_string(),
            reason: e.to_string(),
        })?;

        Ok(serde_json::from_value(response).map_err(BusError::from)?)
    }
}

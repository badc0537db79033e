//! Core bus trait definitions

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Boxed future returned by subscription and service handlers
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Publish/subscribe and request/response transport the controller talks to
///
/// Subscription handlers run off the caller's task; they should do as little
/// as possible (typically forward into a channel).
#[async_trait]
pub trait Bus: Send + Sync + Debug {
    /// Publish a message to a topic
    async fn publish<M>(&self, topic: &str, message: M) -> Result<()>
    where
        M: Serialize + Send + Sync + 'static;

    /// Subscribe to a topic with a message handler
    async fn subscribe<M, F>(&self, topic: &str, handler: F) -> Result<SubscriptionHandle>
    where
        M: DeserializeOwned + Send + Sync + 'static,
        F: Fn(M) -> HandlerFuture<()> + Send + Sync + 'static;

    /// Offer a request/response service under `service`
    async fn advertise<Req, Resp, F>(&self, service: &str, handler: F) -> Result<ServiceHandle>
    where
        Req: DeserializeOwned + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
        F: Fn(Req) -> HandlerFuture<Resp> + Send + Sync + 'static;

    /// Whether a server is currently offering `service`
    async fn service_ready(&self, service: &str) -> bool;

    /// Send one request and wait for its response
    async fn call<Req, Resp>(&self, service: &str, request: Req) -> Result<Resp>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + 'static;
}

/// Handle to a subscription (can be used to unsubscribe)
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: Uuid,
    topic: String,
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: Uuid, topic: String, cancel: CancellationToken) -> Self {
        Self { id, topic, cancel }
    }

    /// Get the subscription ID
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// Get the topic name
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop delivering messages to this subscription's handler
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

/// Handle to an advertised service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    service: String,
}

impl ServiceHandle {
    pub(crate) fn new(service: String) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

// Backbone collaborator: the upstream decision system's session
//
// The core only needs connect / disconnect / liveness from it. The zenoh
// implementation additionally hands out the subscriber that carries commands.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use zenoh::handlers::FifoChannelHandler;
use zenoh::pubsub::Subscriber;
use zenoh::sample::Sample;
use zenoh::{Config, Session};

#[derive(Debug, thiserror::Error)]
pub enum BackboneError {
    #[error("Invalid backbone config: {0}")]
    Config(String),

    #[error("Failed to open backbone session: {0}")]
    Session(String),

    #[error("Failed to subscribe to {topic}: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Backbone is not connected")]
    NotConnected,
}

/// Session lifecycle of the upstream decision system
pub trait Backbone: Send + Sync + 'static {
    /// Open the session. Port 0 lets the implementation pick its own discovery.
    fn connect(
        &self,
        address: &str,
        port: u16,
    ) -> impl Future<Output = Result<(), BackboneError>> + Send;

    /// Close the session; a no-op when already closed
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;
}

/// Backbone reached through a zenoh session
pub struct ZenohBackbone {
    topic: String,
    session: Mutex<Option<Session>>,
}

impl ZenohBackbone {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            session: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to the command topic on the open session
    pub async fn subscribe(&self) -> Result<Subscriber<FifoChannelHandler<Sample>>, BackboneError> {
        let session = self.lock().clone().ok_or(BackboneError::NotConnected)?;
        let subscriber = session
            .declare_subscriber(self.topic.clone())
            .await
            .map_err(|e| BackboneError::Subscribe {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })?;
        info!("Subscribed to: {}", self.topic);
        Ok(subscriber)
    }
}

/// Zenoh config for the given backbone endpoint
fn session_config(address: &str, port: u16) -> Result<Config, BackboneError> {
    let mut config = Config::default();
    if port != 0 {
        let endpoints = serde_json::json!([format!("tcp/{}:{}", address, port)]).to_string();
        config
            .insert_json5("connect/endpoints", &endpoints)
            .map_err(|e| BackboneError::Config(e.to_string()))?;
    }
    Ok(config)
}

impl Backbone for ZenohBackbone {
    async fn connect(&self, address: &str, port: u16) -> Result<(), BackboneError> {
        self.disconnect().await;

        let config = session_config(address, port)?;
        info!("Opening backbone session ({}:{})...", address, port);
        let session = zenoh::open(config)
            .await
            .map_err(|e| BackboneError::Session(e.to_string()))?;

        *self.lock() = Some(session);
        Ok(())
    }

    async fn disconnect(&self) {
        let session = self.lock().take();
        if let Some(session) = session {
            info!("Closing backbone session");
            if let Err(e) = session.close().await {
                warn!("Failed to close backbone session: {}", e);
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().as_ref().is_some_and(|session| !session.is_closed())
    }
}

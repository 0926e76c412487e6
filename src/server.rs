//! TCP listener and accept loop.

use crate::config::ServerConfig;
use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::matchmaker::Matchmaker;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Pause after a failed accept, so a persistent error does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Bound listener plus the matchmaker shared by every connection.
#[derive(Debug)]
pub struct GameServer {
    listener: TcpListener,
    matchmaker: Matchmaker,
    slots: Arc<Semaphore>,
}

impl GameServer {
    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns a bind [`ServerError`] if the address is unavailable.
    #[instrument(skip(config), fields(address = %config.bind_address()))]
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let address = config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| ServerError::bind(address.as_str(), &e))?;
        let max_clients = (*config.max_clients()).clamp(1, Semaphore::MAX_PERMITS);
        info!(
            ai_delay_ms = *config.ai_delay_ms(),
            max_clients, "Listener bound"
        );
        Ok(Self {
            listener,
            matchmaker: Matchmaker::new(config.ai_delay()),
            slots: Arc::new(Semaphore::new(max_clients)),
        })
    }

    /// Address actually bound, useful when the port was 0.
    ///
    /// # Errors
    ///
    /// Returns an I/O [`ServerError`] if the socket cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(|e| ServerError::io(&e))
    }

    /// Matchmaker serving this listener.
    pub fn matchmaker(&self) -> &Matchmaker {
        &self.matchmaker
    }

    /// Accepts connections forever, one task per client.
    ///
    /// At most `max_clients` connections are served at once. An accepted
    /// client beyond that receives nothing until a slot frees. Accept errors
    /// are logged and the loop continues.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr()?, "Accepting connections");
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "Accepted connection");
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%peer, error = %e, "Could not disable Nagle");
                    }
                    if self.slots.available_permits() == 0 {
                        info!(%peer, "All slots busy, client waits");
                    }
                    let Ok(permit) = Arc::clone(&self.slots).acquire_owned().await else {
                        warn!("Connection slots closed");
                        return Ok(());
                    };
                    let matchmaker = self.matchmaker.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer, matchmaker).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}

use crate::connection::{self, Session};
use crate::error::{BridgeError, Result};
use crate::types::{Song, Status};
use async_trait::async_trait;
use std::time::Duration;

/// Playback control operations against a music daemon
///
/// A client is created disconnected. Callers bracket each operation with
/// [`connect`](ControlClient::connect) and [`disconnect`](ControlClient::disconnect);
/// no session is held between commands.
#[async_trait]
pub trait ControlClient: Send {
    /// Open a session
    async fn connect(&mut self, host: &str, port: u16) -> Result<()>;

    /// Close the session if one is open. Never fails.
    async fn disconnect(&mut self);

    async fn play(&mut self) -> Result<()>;

    async fn pause(&mut self) -> Result<()>;

    async fn stop(&mut self) -> Result<()>;

    async fn next(&mut self) -> Result<()>;

    async fn previous(&mut self) -> Result<()>;

    /// Current playback status
    async fn status(&mut self) -> Result<Status>;

    /// Song at the current play position, if any
    async fn current_song(&mut self) -> Result<Option<Song>>;

    /// Append a stored playlist to the queue
    async fn load(&mut self, playlist: &str) -> Result<()>;
}

/// Music Player Daemon client
///
/// Wraps the blocking `mpd` client; every call runs on tokio's blocking pool.
pub struct MpdClient {
    timeout: Duration,
    session: Option<Session>,
}

impl MpdClient {
    /// Create a disconnected client
    ///
    /// `timeout` bounds connecting and each command round-trip.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            session: None,
        }
    }

    /// Whether a session is currently open
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Run `op` against the open session without blocking the runtime
    async fn blocking<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> mpd::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let mut session = self.session.take().ok_or(BridgeError::NotConnected)?;
        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = op(&mut session);
            (session, result)
        })
        .await?;
        self.session = Some(session);
        Ok(result?)
    }
}

#[async_trait]
impl ControlClient for MpdClient {
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.disconnect().await;

        let host = host.to_string();
        let timeout = self.timeout;
        let session =
            tokio::task::spawn_blocking(move || connection::open(&host, port, timeout)).await??;
        self.session = Some(session);
        Ok(())
    }

    async fn disconnect(&mut self) {
        // Dropping the client closes the socket
        if self.session.take().is_some() {
            tracing::trace!("MPD session closed");
        }
    }

    async fn play(&mut self) -> Result<()> {
        self.blocking(|session| session.play()).await
    }

    async fn pause(&mut self) -> Result<()> {
        self.blocking(|session| session.pause(true)).await
    }

    async fn stop(&mut self) -> Result<()> {
        self.blocking(|session| session.stop()).await
    }

    async fn next(&mut self) -> Result<()> {
        self.blocking(|session| session.next()).await
    }

    async fn previous(&mut self) -> Result<()> {
        self.blocking(|session| session.prev()).await
    }

    async fn status(&mut self) -> Result<Status> {
        self.blocking(|session| session.status())
            .await
            .map(Status::from)
    }

    async fn current_song(&mut self) -> Result<Option<Song>> {
        self.blocking(|session| session.currentsong())
            .await
            .map(|song| song.map(Song::from))
    }

    async fn load(&mut self, playlist: &str) -> Result<()> {
        let playlist = playlist.to_string();
        self.blocking(move |session| session.load(playlist.as_str(), ..))
            .await
    }
}

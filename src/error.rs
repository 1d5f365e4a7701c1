use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while bridging the remote to the music daemon
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The daemon refused the TCP connection
    #[error("Connection to {addr} refused: {source}")]
    ConnectionRefused {
        /// Address that was dialed
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Socket or device I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connect or request timed out
    #[error("Request timeout")]
    Timeout,

    /// A command was issued without an open connection
    #[error("Not connected")]
    NotConnected,

    /// The daemon rejected a command or answered something unexpected
    #[error("MPD error: {0}")]
    Mpd(#[source] mpd::error::Error),

    /// The blocking worker running a command went away
    #[error("Worker error: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// udev enumeration or monitor failure
    #[error("udev error: {0}")]
    Udev(#[source] std::io::Error),
}

impl BridgeError {
    /// Whether this error is a refused control connection
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, BridgeError::ConnectionRefused { .. })
    }
}

impl From<mpd::error::Error> for BridgeError {
    fn from(error: mpd::error::Error) -> Self {
        match error {
            // Socket timeouts surface as plain I/O errors from the client
            mpd::error::Error::Io(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                BridgeError::Timeout
            }
            mpd::error::Error::Io(e) => BridgeError::Io(e),
            other => BridgeError::Mpd(other),
        }
    }
}

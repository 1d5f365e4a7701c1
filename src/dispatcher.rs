use crate::client::ControlClient;
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::input::{KeyEventSource, RemoteKey};
use crate::types::{DeviceId, PlaybackState};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Why a dispatch loop stopped
#[derive(Debug)]
pub enum LoopExit {
    /// The lifecycle monitor asked the loop to stop
    Cancelled,
    /// The device event stream finished (device unplugged)
    Ended,
    /// A device read or control operation failed
    Failed(BridgeError),
}

/// Work performed inside one scoped control session
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    LoadPlaylist(String),
    Stop,
    PlayToggle,
    Previous,
    Next,
}

/// Translates remote key presses into daemon commands for one attached device
pub struct CommandDispatcher<C, S> {
    config: Arc<Config>,
    devnode: DeviceId,
    client: C,
    source: S,
}

impl<C, S> CommandDispatcher<C, S>
where
    C: ControlClient,
    S: KeyEventSource,
{
    /// Create a dispatcher for an opened device
    ///
    /// The caller queues the playlist with [`load_playlist`](Self::load_playlist)
    /// before running the loop.
    pub fn new(config: Arc<Config>, devnode: DeviceId, client: C, source: S) -> Self {
        Self {
            config,
            devnode,
            client,
            source,
        }
    }

    /// Device node this dispatcher reads from
    pub fn devnode(&self) -> &DeviceId {
        &self.devnode
    }

    /// Read key events and issue commands until stopped, the stream ends, or a fault
    pub async fn run(&mut self, mut stop_rx: broadcast::Receiver<()>) -> LoopExit {
        tracing::debug!("Dispatching key events from {}", self.devnode.display());

        loop {
            let event = tokio::select! {
                biased;
                _ = stop_rx.recv() => return LoopExit::Cancelled,
                event = self.source.next_key_event() => event,
            };

            match event {
                Ok(Some(event)) => {
                    if let Some(key) = event.pressed() {
                        if let Err(e) = self.handle_key(key).await {
                            return LoopExit::Failed(e);
                        }
                    }
                }
                Ok(None) => return LoopExit::Ended,
                Err(e) => return LoopExit::Failed(e),
            }
        }
    }

    /// Issue the command bound to a button
    pub async fn handle_key(&mut self, key: RemoteKey) -> Result<()> {
        tracing::info!("{}", key.label());
        match key {
            RemoteKey::Stop => self.stop().await,
            RemoteKey::PlayPause => self.play_toggle().await,
            RemoteKey::Previous => self.previous_song().await,
            RemoteKey::Next => self.next_song().await,
        }
    }

    pub async fn load_playlist(&mut self, playlist: &str) -> Result<()> {
        self.with_connection(Action::LoadPlaylist(playlist.to_string()))
            .await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.with_connection(Action::Stop).await
    }

    /// Resume when stopped or paused, pause when playing
    pub async fn play_toggle(&mut self) -> Result<()> {
        self.with_connection(Action::PlayToggle).await
    }

    pub async fn previous_song(&mut self) -> Result<()> {
        self.with_connection(Action::Previous).await
    }

    pub async fn next_song(&mut self) -> Result<()> {
        self.with_connection(Action::Next).await
    }

    /// Stop playback
    ///
    /// This does not concern the control session, which is already closed after
    /// every command.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.stop().await
    }

    /// Release the device handle
    pub fn close(&mut self) {
        self.source.close();
    }

    /// Run `action` inside a fresh session that is closed on every exit path
    ///
    /// A refused connection is logged and the action skipped.
    async fn with_connection(&mut self, action: Action) -> Result<()> {
        let result = match self
            .client
            .connect(&self.config.host, self.config.port)
            .await
        {
            Ok(()) => self.perform(&action).await,
            Err(e) => Err(e),
        };

        self.client.disconnect().await;

        match result {
            Err(e) if e.is_connection_refused() => {
                tracing::error!("Failed to connect to MPD server. Is MPD server running? {}", e);
                Ok(())
            }
            other => other,
        }
    }

    async fn perform(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::LoadPlaylist(playlist) => {
                self.client.load(playlist).await?;
                tracing::info!("Loaded playlist: {}", playlist);
            }
            Action::Stop => self.client.stop().await?,
            Action::PlayToggle => {
                let status = self.client.status().await?;
                match status.state {
                    PlaybackState::Stop | PlaybackState::Pause => {
                        self.client.play().await?;
                        self.log_current_song().await?;
                    }
                    PlaybackState::Play => self.client.pause().await?,
                }
            }
            Action::Previous => {
                self.client.previous().await?;
                self.log_current_song().await?;
            }
            Action::Next => {
                self.client.next().await?;
                self.log_current_song().await?;
            }
        }
        Ok(())
    }

    async fn log_current_song(&mut self) -> Result<()> {
        let song = self.client.current_song().await?.unwrap_or_default();
        tracing::info!("Playing: {}", song);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::input::{KeyEvent, KeyTransition};
    use crate::types::{Song, Status};
    use async_trait::async_trait;
    use evdev::Key;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts ERROR level events seen by the current thread's subscriber
    #[derive(Clone, Default)]
    struct ErrorCounter(Arc<AtomicUsize>);

    impl ErrorCounter {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Calls observed by the fake client
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Call {
        Connect,
        Disconnect,
        Play,
        Pause,
        Stop,
        Next,
        Previous,
        Status,
        CurrentSong,
        Load(String),
    }

    /// How the fake daemon behaves on connect
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Daemon {
        Up,
        Refusing,
    }

    #[derive(Clone)]
    pub(crate) struct FakeClient {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub state: Arc<Mutex<PlaybackState>>,
        pub daemon: Arc<Mutex<Daemon>>,
        pub fail_next: Arc<Mutex<bool>>,
        /// Make `stop` take a while, as a slow daemon would
        pub stall_stop: Arc<Mutex<bool>>,
    }

    impl FakeClient {
        pub fn new(state: PlaybackState) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                state: Arc::new(Mutex::new(state)),
                daemon: Arc::new(Mutex::new(Daemon::Up)),
                fail_next: Arc::new(Mutex::new(false)),
                stall_stop: Arc::new(Mutex::new(false)),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, call: &Call) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ControlClient for FakeClient {
        async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
            self.record(Call::Connect);
            match *self.daemon.lock().unwrap() {
                Daemon::Up => Ok(()),
                Daemon::Refusing => Err(BridgeError::ConnectionRefused {
                    addr: format!("{}:{}", host, port),
                    source: std::io::ErrorKind::ConnectionRefused.into(),
                }),
            }
        }

        async fn disconnect(&mut self) {
            self.record(Call::Disconnect);
        }

        async fn play(&mut self) -> Result<()> {
            self.record(Call::Play);
            *self.state.lock().unwrap() = PlaybackState::Play;
            Ok(())
        }

        async fn pause(&mut self) -> Result<()> {
            self.record(Call::Pause);
            *self.state.lock().unwrap() = PlaybackState::Pause;
            Ok(())
        }

        async fn stop(&mut self) -> Result<()> {
            self.record(Call::Stop);
            let stall = *self.stall_stop.lock().unwrap();
            if stall {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            *self.state.lock().unwrap() = PlaybackState::Stop;
            Ok(())
        }

        async fn next(&mut self) -> Result<()> {
            self.record(Call::Next);
            let mut fail = self.fail_next.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(BridgeError::Timeout);
            }
            Ok(())
        }

        async fn previous(&mut self) -> Result<()> {
            self.record(Call::Previous);
            Ok(())
        }

        async fn status(&mut self) -> Result<Status> {
            self.record(Call::Status);
            Ok(Status {
                state: *self.state.lock().unwrap(),
                volume: 100,
                queue_len: 0,
            })
        }

        async fn current_song(&mut self) -> Result<Option<Song>> {
            self.record(Call::CurrentSong);
            Ok(Some(Song {
                title: Some("Sinnerman".into()),
                ..Song::default()
            }))
        }

        async fn load(&mut self, playlist: &str) -> Result<()> {
            self.record(Call::Load(playlist.to_string()));
            Ok(())
        }
    }

    /// Replays scripted events, then either ends or waits forever
    pub(crate) struct FakeSource {
        pub events: VecDeque<Result<Option<KeyEvent>>>,
        pub hang_when_empty: bool,
        pub reads: Arc<Mutex<usize>>,
        pub closes: Arc<Mutex<usize>>,
    }

    impl FakeSource {
        pub fn new(events: Vec<KeyEvent>, hang_when_empty: bool) -> Self {
            Self {
                events: events.into_iter().map(|e| Ok(Some(e))).collect(),
                hang_when_empty,
                reads: Arc::new(Mutex::new(0)),
                closes: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl KeyEventSource for FakeSource {
        async fn next_key_event(&mut self) -> Result<Option<KeyEvent>> {
            *self.reads.lock().unwrap() += 1;
            match self.events.pop_front() {
                Some(event) => event,
                None if self.hang_when_empty => std::future::pending().await,
                None => Ok(None),
            }
        }

        fn close(&mut self) {
            *self.closes.lock().unwrap() += 1;
        }
    }

    pub(crate) fn down(key: Key) -> KeyEvent {
        KeyEvent::new(key, KeyTransition::Down)
    }

    pub(crate) fn up(key: Key) -> KeyEvent {
        KeyEvent::new(key, KeyTransition::Up)
    }

    fn dispatcher(
        client: FakeClient,
        events: Vec<KeyEvent>,
    ) -> CommandDispatcher<FakeClient, FakeSource> {
        CommandDispatcher::new(
            Arc::new(Config::default()),
            DeviceId::from("/dev/input/event7"),
            client,
            FakeSource::new(events, false),
        )
    }

    #[tokio::test]
    async fn play_toggle_from_stopped_plays() {
        let client = FakeClient::new(PlaybackState::Stop);
        let mut d = dispatcher(client.clone(), vec![]);

        d.play_toggle().await.unwrap();

        assert_eq!(client.count(&Call::Play), 1);
        assert_eq!(client.count(&Call::Pause), 0);
        assert_eq!(client.count(&Call::CurrentSong), 1);
    }

    #[tokio::test]
    async fn play_toggle_from_paused_plays() {
        let client = FakeClient::new(PlaybackState::Pause);
        let mut d = dispatcher(client.clone(), vec![]);

        d.play_toggle().await.unwrap();

        assert_eq!(client.count(&Call::Play), 1);
        assert_eq!(client.count(&Call::Pause), 0);
    }

    #[tokio::test]
    async fn play_toggle_while_playing_pauses() {
        let client = FakeClient::new(PlaybackState::Play);
        let mut d = dispatcher(client.clone(), vec![]);

        d.play_toggle().await.unwrap();

        assert_eq!(client.count(&Call::Pause), 1);
        assert_eq!(client.count(&Call::Play), 0);
    }

    #[tokio::test]
    async fn every_command_gets_its_own_session() {
        let client = FakeClient::new(PlaybackState::Stop);
        let mut d = dispatcher(client.clone(), vec![]);

        d.next_song().await.unwrap();
        d.stop().await.unwrap();

        assert_eq!(
            client.calls(),
            vec![
                Call::Connect,
                Call::Next,
                Call::CurrentSong,
                Call::Disconnect,
                Call::Connect,
                Call::Stop,
                Call::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn loads_playlist_in_own_session() {
        let client = FakeClient::new(PlaybackState::Stop);
        let mut d = dispatcher(client.clone(), vec![]);

        d.load_playlist("evening").await.unwrap();

        assert_eq!(d.devnode(), &DeviceId::from("/dev/input/event7"));
        assert_eq!(
            client.calls(),
            vec![Call::Connect, Call::Load("evening".into()), Call::Disconnect]
        );
    }

    #[tokio::test]
    async fn key_up_is_ignored() {
        let client = FakeClient::new(PlaybackState::Play);
        let mut d = dispatcher(
            client.clone(),
            vec![down(Key::KEY_NEXTSONG), up(Key::KEY_NEXTSONG)],
        );
        let (_stop_tx, stop_rx) = broadcast::channel(1);

        let exit = d.run(stop_rx).await;

        assert!(matches!(exit, LoopExit::Ended));
        assert_eq!(client.count(&Call::Next), 1);
    }

    #[tokio::test]
    async fn unrecognised_keys_are_ignored() {
        let client = FakeClient::new(PlaybackState::Play);
        let mut d = dispatcher(
            client.clone(),
            vec![
                down(Key::KEY_A),
                down(Key::KEY_PLAYPAUSE),
                KeyEvent::new(Key::KEY_STOPCD, KeyTransition::Repeat),
            ],
        );
        let (_stop_tx, stop_rx) = broadcast::channel(1);

        d.run(stop_rx).await;

        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn buttons_map_to_commands() {
        let client = FakeClient::new(PlaybackState::Play);
        let mut d = dispatcher(
            client.clone(),
            vec![
                down(Key::KEY_STOPCD),
                down(Key::KEY_PREVIOUSSONG),
                down(Key::KEY_PLAYCD),
            ],
        );
        let (_stop_tx, stop_rx) = broadcast::channel(1);

        d.run(stop_rx).await;

        assert_eq!(client.count(&Call::Stop), 1);
        assert_eq!(client.count(&Call::Previous), 1);
        // Stopped by the first button, so the toggle resumes playback
        assert_eq!(client.count(&Call::Play), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_skipped() {
        let client = FakeClient::new(PlaybackState::Stop);
        *client.daemon.lock().unwrap() = Daemon::Refusing;
        let mut d = dispatcher(client.clone(), vec![]);

        d.next_song().await.unwrap();
        assert_eq!(client.count(&Call::Next), 0);
        assert_eq!(client.count(&Call::Disconnect), 1);

        *client.daemon.lock().unwrap() = Daemon::Up;
        d.next_song().await.unwrap();
        assert_eq!(client.count(&Call::Connect), 2);
        assert_eq!(client.count(&Call::Next), 1);
    }

    #[tokio::test]
    async fn refused_connection_logs_one_error_per_operation() {
        let errors = ErrorCounter::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(errors.clone()));

        let client = FakeClient::new(PlaybackState::Stop);
        *client.daemon.lock().unwrap() = Daemon::Refusing;
        let mut d = dispatcher(client.clone(), vec![]);

        d.next_song().await.unwrap();
        assert_eq!(errors.count(), 1);

        d.play_toggle().await.unwrap();
        assert_eq!(errors.count(), 2);

        *client.daemon.lock().unwrap() = Daemon::Up;
        d.stop().await.unwrap();
        assert_eq!(errors.count(), 2);
    }

    #[tokio::test]
    async fn operation_fault_releases_session_and_ends_loop() {
        let client = FakeClient::new(PlaybackState::Play);
        *client.fail_next.lock().unwrap() = true;
        let mut d = dispatcher(
            client.clone(),
            vec![down(Key::KEY_NEXTSONG), down(Key::KEY_STOPCD)],
        );
        let (_stop_tx, stop_rx) = broadcast::channel(1);

        let exit = d.run(stop_rx).await;

        assert!(matches!(exit, LoopExit::Failed(BridgeError::Timeout)));
        assert_eq!(client.calls(), vec![Call::Connect, Call::Next, Call::Disconnect]);
    }

    #[tokio::test]
    async fn stop_signal_cancels_waiting_loop() {
        let client = FakeClient::new(PlaybackState::Play);
        let source = FakeSource::new(vec![], true);
        let mut d = CommandDispatcher::new(
            Arc::new(Config::default()),
            DeviceId::from("/dev/input/event7"),
            client.clone(),
            source,
        );
        let (stop_tx, stop_rx) = broadcast::channel(1);
        stop_tx.send(()).unwrap();

        let exit = d.run(stop_rx).await;

        assert!(matches!(exit, LoopExit::Cancelled));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn disconnect_stops_playback() {
        let client = FakeClient::new(PlaybackState::Play);
        let mut d = dispatcher(client.clone(), vec![]);

        d.disconnect().await.unwrap();

        assert_eq!(client.calls(), vec![Call::Connect, Call::Stop, Call::Disconnect]);
    }
}

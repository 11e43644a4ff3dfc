//! Common test utilities shared across integration tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use muezzin::notify::Notifier;
use muezzin::playback::{AssetLibrary, PlaybackController};
use muezzin::testing::{CountingVibrator, FakeAudioBackend, FixedTimeSource, RecordingNotifier};
use muezzin::timer::FIRED_CHANNEL_BUFFER;
use muezzin::timesource::{DayTimes, TimeSource};
use muezzin::{
    AlarmDispatcher, AzanScheduler, DispatcherConfig, EventBus, InMemoryStore, SchedulerHandle,
    SleepTimer, WakeSource,
};

/// A fully wired scheduling core over fakes: in-memory store, sleep
/// timer, fake audio, recording notifier, counting vibrator.
pub struct TestRig {
    pub handle: SchedulerHandle,
    pub store: Arc<InMemoryStore>,
    pub timer: Arc<SleepTimer>,
    pub playback: PlaybackController,
    pub audio: Arc<FakeAudioBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub vibrator: Arc<CountingVibrator>,
    pub wake: WakeSource,
    pub assets_dir: PathBuf,
    engine_task: JoinHandle<()>,
    dispatcher_task: JoinHandle<()>,
}

impl TestRig {
    /// Start a rig with an empty fixed time source.
    pub async fn start() -> Self {
        Self::start_with_source(Arc::new(FixedTimeSource::new(DayTimes::new()))).await
    }

    /// Start a rig with the given time source.
    pub async fn start_with_source(source: Arc<dyn TimeSource>) -> Self {
        let assets_dir =
            std::env::temp_dir().join(format!("muezzin-rig-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&assets_dir).expect("create assets dir");
        for track in ["azan", "azan_fajr", "azan_makkah"] {
            std::fs::write(assets_dir.join(format!("{}.mp3", track)), b"fake")
                .expect("write asset");
        }

        let events = Arc::new(EventBus::new());
        let audio = Arc::new(FakeAudioBackend::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let vibrator = Arc::new(CountingVibrator::new());
        let wake = WakeSource::new();

        let playback = PlaybackController::new(
            Arc::clone(&audio) as Arc<dyn muezzin::playback::AudioBackend>,
            Arc::clone(&vibrator) as Arc<dyn muezzin::playback::Vibrator>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            AssetLibrary::new(&assets_dir),
            Arc::clone(&events),
        );

        let (fired_tx, fired_rx) = mpsc::channel(FIRED_CHANNEL_BUFFER);
        let store = Arc::new(InMemoryStore::new());
        let timer = Arc::new(SleepTimer::new(
            fired_tx,
            Arc::new(muezzin::platform::permissions::Unrestricted),
        ));

        let scheduler = AzanScheduler::with_store(
            Arc::clone(&store),
            Arc::clone(&timer) as Arc<dyn muezzin::AlarmTimer>,
            source,
        )
        .with_event_bus(Arc::clone(&events));
        let (handle, engine_task) = scheduler.start().await;

        let (dispatcher, _state_rx) = AlarmDispatcher::new(
            playback.clone(),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            handle.clone(),
            events,
            wake.clone(),
            DispatcherConfig::default(),
        );
        let dispatcher_task = dispatcher.spawn(fired_rx);

        Self {
            handle,
            store,
            timer,
            playback,
            audio,
            notifier,
            vibrator,
            wake,
            assets_dir,
            engine_task,
            dispatcher_task,
        }
    }

    /// Shut the rig down and clean up its temp assets.
    pub async fn shutdown(self) {
        let _ = self.handle.shutdown().await;
        let _ = self.engine_task.await;
        self.dispatcher_task.abort();
        let _ = std::fs::remove_dir_all(&self.assets_dir);
    }
}

/// Poll a predicate until it holds, panicking after the timeout.
///
/// More reliable than fixed sleeps since dispatch latency can vary.
pub async fn wait_for(what: &str, timeout: Duration, predicate: impl Fn() -> bool) {
    let start = tokio::time::Instant::now();
    loop {
        if predicate() {
            return;
        }
        if start.elapsed() > timeout {
            panic!("timeout waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

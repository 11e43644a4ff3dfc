//! muezzin - prayer-times alarm scheduler and azan playback daemon.
//!
//! Usage:
//!   muezzin run [config.yaml]        Run the daemon
//!   muezzin validate [config.yaml]   Validate configuration without running
//!   muezzin test-azan [config.yaml]  Play a track immediately and exit

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use muezzin::api::{self, ApiState};
use muezzin::config::{self, AppConfig, StorageConfig};
use muezzin::notify::{LogNotifier, Notifier};
use muezzin::platform::permissions::Unrestricted;
use muezzin::playback::{AssetLibrary, AudioBackend, NullVibrator, PlaybackController};
use muezzin::scheduler::{spawn_refresh_loop, RefreshSchedule};
use muezzin::timer::FIRED_CHANNEL_BUFFER;
use muezzin::timesource::HttpTimeSource;
use muezzin::{
    AlarmDispatcher, AzanScheduler, DispatcherConfig, EventBus, InMemoryStore, ScheduleStore,
    SleepTimer, TrackId, WakeSource,
};

#[cfg(feature = "sqlite")]
use muezzin::storage::SqliteStore;

/// muezzin - prayer-times alarm scheduler
#[derive(Parser)]
#[command(name = "muezzin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon
    Run {
        /// Path to the configuration file
        #[arg(value_name = "CONFIG", default_value = "muezzin.yaml")]
        config: PathBuf,
    },

    /// Validate the configuration without running
    Validate {
        /// Path to the configuration file
        #[arg(value_name = "CONFIG", default_value = "muezzin.yaml")]
        config: PathBuf,
    },

    /// Play a track immediately, bypassing the scheduler
    TestAzan {
        /// Path to the configuration file
        #[arg(value_name = "CONFIG", default_value = "muezzin.yaml")]
        config: PathBuf,

        /// Track to play (defaults to the configured default track)
        #[arg(short, long)]
        track: Option<String>,
    },
}

#[cfg(feature = "audio")]
fn audio_backend() -> Arc<dyn AudioBackend> {
    Arc::new(muezzin::playback::RodioBackend)
}

#[cfg(not(feature = "audio"))]
fn audio_backend() -> Arc<dyn AudioBackend> {
    Arc::new(muezzin::playback::NullAudioBackend)
}

fn build_playback(
    config: &AppConfig,
    notifier: Arc<dyn Notifier>,
    events: Arc<EventBus>,
) -> PlaybackController {
    PlaybackController::new(
        audio_backend(),
        Arc::new(NullVibrator),
        notifier,
        AssetLibrary::new(&config.audio.assets_dir),
        events,
    )
}

async fn run_daemon<S: ScheduleStore + 'static>(
    store: Arc<S>,
    config: AppConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let tz = config::parse_timezone(&config)?;
    let events = Arc::new(EventBus::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());

    let (fired_tx, fired_rx) = mpsc::channel(FIRED_CHANNEL_BUFFER);
    let timer = Arc::new(SleepTimer::new(fired_tx, Arc::new(Unrestricted)));
    let playback = build_playback(&config, Arc::clone(&notifier), Arc::clone(&events));

    let scheduler = AzanScheduler::with_store(
        Arc::clone(&store),
        timer,
        Arc::new(HttpTimeSource::new()),
    )
    .with_event_bus(Arc::clone(&events))
    .with_settings(config.settings())
    .with_location(config.coordinates(), tz)
    .with_method(config.method);

    let (handle, engine_task) = scheduler.start().await;

    // re-arm whatever survived the last run before fetching anything
    match handle.recover().await {
        Ok(rearmed) if rearmed > 0 => info!(rearmed, "recovered persisted alarms"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "recovery failed"),
    }

    let (dispatcher, _dispatch_state) = AlarmDispatcher::new(
        playback.clone(),
        notifier,
        handle.clone(),
        Arc::clone(&events),
        WakeSource::new(),
        DispatcherConfig {
            reminder_lead_minutes: config.reminder_lead_minutes,
            ..DispatcherConfig::default()
        },
    );
    let dispatcher_task = dispatcher.spawn(fired_rx);

    let refresh_schedule = RefreshSchedule::new(&config.refresh)?;
    let refresh_task = spawn_refresh_loop(handle.clone(), refresh_schedule, tz);

    if let Err(e) = handle.refresh().await {
        warn!(error = %e, "initial refresh failed, will retry on schedule");
    }

    if config.api.enabled {
        let state = ApiState {
            handle: handle.clone(),
            store,
            playback,
            settings: config.settings(),
        };
        let api_config = config.api.clone();
        tokio::select! {
            result = api::serve(&api_config, state) => {
                if let Err(e) = result {
                    error!(error = %e, "control API failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
        }
    } else {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    }

    refresh_task.abort();
    handle.shutdown().await?;
    let _ = engine_task.await;
    dispatcher_task.abort();

    Ok(())
}

async fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Run { config } => {
            let config = config::load_config(&config)?;
            match config.storage.clone() {
                StorageConfig::Memory => {
                    run_daemon(Arc::new(InMemoryStore::new()), config).await
                }
                #[cfg(feature = "sqlite")]
                StorageConfig::Sqlite { path } => {
                    let store = SqliteStore::new(&path).await?;
                    run_daemon(Arc::new(store), config).await
                }
                #[cfg(not(feature = "sqlite"))]
                StorageConfig::Sqlite { path } => Err(format!(
                    "sqlite storage configured ({}) but the 'sqlite' feature is disabled",
                    path
                )
                .into()),
            }
        }

        Commands::Validate { config } => {
            let loaded = config::load_config(&config)?;
            let storage = match &loaded.storage {
                StorageConfig::Memory => "memory storage".to_string(),
                StorageConfig::Sqlite { path } => format!("sqlite at {}", path),
            };
            println!(
                "configuration valid: {} at {} ({}), refresh '{}'",
                loaded.location.timezone,
                loaded.coordinates(),
                storage,
                loaded.refresh
            );
            Ok(())
        }

        Commands::TestAzan { config, track } => {
            let config = config::load_config(&config)?;
            let events = Arc::new(EventBus::new());
            let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new());
            let playback = build_playback(&config, notifier, events);

            let track = track
                .map(TrackId::new)
                .unwrap_or_else(|| config.audio.default_track.clone());
            playback.test_azan(&track, config.audio.volume).await?;

            // hold the process until playback finishes
            while playback.is_playing().await {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run_command(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal error");
            ExitCode::FAILURE
        }
    }
}

//! edlink agent entry point.
//!
//! Wires the telemetry producers, the publish queue, the MQTT connection and
//! the command router together, then runs until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! edlink [OPTIONS]
//!
//! Options:
//!   --config <PATH>        Configuration file [default: config.toml]
//!   --journal-dir <PATH>   Overrides general.journal_dir
//! ```
//!
//! # Tasks
//!
//! ```text
//! main()
//!  ├─ tokio task   run_tail_loop        journal cursor + loadout tracker
//!  ├─ std thread   watch thread         Status.json / ModulesInfo.json / keymap.toml
//!  ├─ tokio task   run_dispatch_loop    PublishQueue ──► MqttTransport
//!  └─ tokio task   MqttInbound::run     broker ──► CommandRouter (blocking pool)
//! ```
//!
//! All of them watch the same `running` flag, which the Ctrl-C handler
//! clears.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use edlink_agent::application::publish_queue::{
    run_dispatch_loop, BusTransport, PublishQueue, Publisher,
};
use edlink_agent::application::route_command::CommandRouter;
use edlink_agent::application::tail_journal::{run_tail_loop, JournalTailer};
use edlink_agent::application::watch_snapshots::SnapshotWatchers;
use edlink_agent::infrastructure::bus::{self, MqttSettings};
use edlink_agent::infrastructure::file_watcher::{changed_paths, DirectoryWatcher};
use edlink_agent::infrastructure::input_emulation::platform_input;
use edlink_agent::infrastructure::storage::config::load_config;
use edlink_agent::infrastructure::storage::keymap::{load_keymap, KeymapWatch};
use edlink_core::PacketBuilder;

/// How long the watch thread blocks before rechecking the stop flag.
const WATCH_WAIT: Duration = Duration::from_millis(250);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Elite Dangerous telemetry to MQTT bridge.
#[derive(Debug, Parser)]
#[command(name = "edlink", about = "Bridge Elite Dangerous telemetry to MQTT", version)]
struct Cli {
    /// Path to the TOML configuration file.  A missing file means defaults.
    #[arg(long, default_value = "config.toml", env = "EDLINK_CONFIG")]
    config: PathBuf,

    /// Folder holding the journal and snapshot files.
    #[arg(long, env = "EDLINK_JOURNAL_DIR")]
    journal_dir: Option<PathBuf>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    if let Some(dir) = cli.journal_dir {
        config.general.journal_dir = dir;
    }
    config.validate().context("invalid configuration")?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .init();

    info!("edlink starting");

    let journal_dir = config.general.journal_dir.clone();
    if !journal_dir.is_dir() {
        bail!("journal directory {} does not exist", journal_dir.display());
    }
    info!(dir = %journal_dir.display(), "journal directory");

    let running = Arc::new(AtomicBool::new(true));

    // ── Command router ────────────────────────────────────────────────────────
    let config_dir = cli
        .config
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let keymap_path = config.keymap_path(config_dir);
    let keymap = load_keymap(&config.keymap, &keymap_path)
        .with_context(|| format!("failed to load keymap {}", keymap_path.display()))?;
    let router = Arc::new(CommandRouter::new(
        keymap,
        platform_input(),
        config.router_settings(),
    ));

    // ── Publish path ──────────────────────────────────────────────────────────
    let queue = Arc::new(PublishQueue::new(config.queue.capacity));
    let publisher = Publisher::new(
        Arc::new(PacketBuilder::new()),
        Arc::clone(&queue),
        config.base_topic(),
    );

    // ── MQTT ──────────────────────────────────────────────────────────────────
    let (transport, inbound) = bus::connect(&MqttSettings::from_config(&config));
    let mqtt_task = tokio::spawn(inbound.run(Arc::clone(&router), Arc::clone(&running)));
    let dispatch_task = tokio::spawn(run_dispatch_loop(
        Arc::clone(&queue),
        Arc::new(transport.clone()) as Arc<dyn BusTransport>,
        Arc::clone(&running),
    ));

    // ── Telemetry producers ───────────────────────────────────────────────────
    let tailer = JournalTailer::new(&journal_dir, publisher.clone(), config.general.publish_chat);
    let tail_task = tokio::spawn(run_tail_loop(
        tailer,
        config.poll_interval(),
        Arc::clone(&running),
    ));

    let watch_thread = {
        let watchers = SnapshotWatchers::new(&journal_dir, publisher);
        let router = Arc::clone(&router);
        let running = Arc::clone(&running);
        let inline_keymap = config.keymap.clone();
        std::thread::Builder::new()
            .name("edlink-watch".into())
            .spawn(move || {
                run_watch_thread(
                    &journal_dir,
                    watchers,
                    &keymap_path,
                    &inline_keymap,
                    &router,
                    &running,
                )
            })
            .context("failed to start watch thread")?
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("edlink ready");

    for (name, task) in [("journal tailer", tail_task), ("dispatch", dispatch_task)] {
        if let Err(e) = task.await {
            error!("{name} task failed: {e}");
        }
    }
    transport.disconnect();
    if let Err(e) = mqtt_task.await {
        error!("MQTT task failed: {e}");
    }
    if watch_thread.join().is_err() {
        error!("watch thread panicked");
    }

    info!(dropped = queue.evicted_count(), pending = queue.len(), "edlink stopped");
    Ok(())
}

/// Blocking loop: routes directory notifications to the snapshot watchers
/// and reloads the keymap when its file changes.
fn run_watch_thread(
    journal_dir: &Path,
    mut watchers: SnapshotWatchers,
    keymap_path: &Path,
    inline_keymap: &std::collections::BTreeMap<String, String>,
    router: &CommandRouter,
    running: &AtomicBool,
) {
    let mut watcher = match DirectoryWatcher::new() {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("snapshot watching disabled: {e}");
            return;
        }
    };
    if let Err(e) = watcher.watch(journal_dir) {
        error!("snapshot watching disabled: {e}");
        return;
    }
    let keymap_watch = KeymapWatch::new(keymap_path);
    match &keymap_watch {
        Some(watch) if !watch.shares_dir_with(journal_dir) => {
            if let Err(e) = watcher.watch(watch.dir()) {
                warn!("keymap reload disabled: {e}");
            }
        }
        Some(_) => {}
        None => warn!(
            path = %keymap_path.display(),
            "keymap directory not found; keymap reload disabled"
        ),
    }

    for e in watchers.refresh_all() {
        warn!("initial snapshot read failed: {e}");
    }

    while running.load(Ordering::Relaxed) {
        for path in changed_paths(&watcher.wait(WATCH_WAIT)) {
            if keymap_watch.as_ref().is_some_and(|watch| watch.matches(&path)) {
                match load_keymap(inline_keymap, keymap_path) {
                    Ok(keymap) => router.reload_keymap(keymap),
                    Err(e) => warn!("keymap reload failed, keeping previous keymap: {e}"),
                }
                continue;
            }
            match watchers.on_path_changed(&path) {
                Ok(Some(true)) => debug!(file = %path.display(), "snapshot published"),
                Ok(_) => {}
                Err(e) => warn!("snapshot refresh failed: {e}"),
            }
        }
    }
    debug!("watch thread stopped");
}

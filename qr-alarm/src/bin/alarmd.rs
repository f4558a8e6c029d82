//! The alarm daemon.
//!
//! Owns the alarm record, the wake timer and the ringing session, and
//! exposes them over the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use qr_alarm::api::{self, SharedState};
use qr_alarm::clock::{Clock, SystemClock};
use qr_alarm::config::DaemonConfig;
use qr_alarm::platform::{AlertSurface, AudioOutput, HeadlessAudio, LogAlertSurface};
use qr_alarm::scheduler::{Scheduler, TokioWakeTimer};
use qr_alarm::session::SessionManager;
use qr_alarm::store::{ConfigStore, InMemory, JsonFile, Persistence};
use qr_alarm::tracing::prelude::*;

fn main() -> Result<()> {
    // The local offset can only be read while the process is single-threaded.
    let clock = SystemClock::local();
    qr_alarm::tracing::init_journald_or_stdout(clock.local_offset());

    let config = DaemonConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let handle = runtime.handle().clone();
    runtime.block_on(run(config, Arc::new(clock), handle))
}

async fn run(config: DaemonConfig, clock: Arc<dyn Clock>, runtime: Handle) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting qr-alarmd");

    let backend: Box<dyn Persistence> = match &config.state_path {
        Some(path) => {
            info!(path = %path.display(), "Alarm state file");
            Box::new(JsonFile::new(path))
        }
        None => {
            warn!("Alarm state kept in memory only; it will not survive a restart");
            Box::new(InMemory::new())
        }
    };
    let store = Arc::new(ConfigStore::open(backend));

    let shutdown = CancellationToken::new();
    let alert: Arc<dyn AlertSurface> = Arc::new(LogAlertSurface);
    let (manager, session) = SessionManager::new(
        store.clone(),
        audio_output(&config),
        alert,
        clock.clone(),
        config.ringing.clone(),
    );
    let session_task = tokio::spawn(manager.run(shutdown.clone()));

    let timer = Arc::new(TokioWakeTimer::new(
        runtime,
        Arc::new(session.clone()),
        clock.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(store.clone(), timer, clock));
    if let Some(at) = scheduler.restore() {
        info!(%at, "Alarm restored");
    }

    let state = SharedState {
        store,
        scheduler,
        session,
    };
    let mut api_task = tokio::spawn(api::serve(config.api_addr, state, shutdown.clone()));

    let served = tokio::select! {
        signal = wait_for_signal() => {
            signal?;
            info!("Shutdown requested");
            shutdown.cancel();
            (&mut api_task).await
        }
        served = &mut api_task => served,
    };

    shutdown.cancel();
    session_task.await.context("session manager panicked")?;
    served
        .context("API task panicked")?
        .context("API server failed")?;

    info!("Stopped");
    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate()).context("cannot watch SIGTERM")?;
    tokio::select! {
        ctrl_c = tokio::signal::ctrl_c() => ctrl_c.context("cannot watch SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(feature = "rodio")]
fn audio_output(config: &DaemonConfig) -> Arc<dyn AudioOutput> {
    use qr_alarm::platform::RodioAudio;

    match RodioAudio::open_default_device(config.default_sound.clone()) {
        Ok(audio) => Arc::new(audio),
        Err(e) => {
            warn!(error = %e, "No audio device, playback will only be logged");
            Arc::new(HeadlessAudio::new(config.default_sound.clone()))
        }
    }
}

#[cfg(not(feature = "rodio"))]
fn audio_output(config: &DaemonConfig) -> Arc<dyn AudioOutput> {
    Arc::new(HeadlessAudio::new(config.default_sound.clone()))
}

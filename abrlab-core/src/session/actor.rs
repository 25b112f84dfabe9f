//! Actor implementation for playback sessions.

use tokio::sync::mpsc;

use super::commands::SessionCommand;
use super::controller::SessionController;
use super::handle::SessionHandle;
use super::timers::TimerTick;
use crate::config::AbrLabConfig;
use crate::media::MediaEngine;

/// Spawns a session actor driving `engine` and returns its handle.
///
/// The actor processes commands, engine events and timer ticks one at a
/// time. It runs until every handle has been dropped.
///
/// # Examples
/// ```rust,no_run
/// use abrlab_core::config::AbrLabConfig;
/// use abrlab_core::media::MediaEngine;
/// use abrlab_core::session::{SessionHandle, spawn_session};
///
/// fn start(engine: impl MediaEngine) -> SessionHandle {
///     spawn_session(engine, AbrLabConfig::default(), "A")
/// }
/// ```
pub fn spawn_session<E>(engine: E, config: AbrLabConfig, label: &str) -> SessionHandle
where
    E: MediaEngine,
{
    let (sender, receiver) = mpsc::channel(config.session.command_buffer.max(1));
    let (controller, ticks) = SessionController::new(Box::new(engine), config, label);
    let id = controller.id();

    tokio::spawn(async move {
        run_actor_loop(controller, receiver, ticks).await;
    });

    SessionHandle::new(id, label.to_string(), sender)
}

/// Runs the session's message processing loop.
async fn run_actor_loop(
    mut controller: SessionController,
    mut receiver: mpsc::Receiver<SessionCommand>,
    mut ticks: mpsc::UnboundedReceiver<TimerTick>,
) {
    tracing::debug!(session = %controller.label(), "Session actor started");

    loop {
        // Engine events and ticks drain before the next command so a command
        // always observes the effects of everything emitted before it.
        tokio::select! {
            biased;
            event = controller.next_engine_event() => controller.handle_engine_event(event),
            Some(tick) = ticks.recv() => controller.handle_tick(tick),
            command = receiver.recv() => match command {
                Some(command) => handle_command(&mut controller, command),
                None => break,
            },
        }
    }

    controller.destroy();
    tracing::debug!(session = %controller.label(), "Session actor stopped");
}

/// Handles a single command for the session.
fn handle_command(controller: &mut SessionController, command: SessionCommand) {
    tracing::trace!(session = %controller.label(), "Command {}", command.as_str());
    match command {
        SessionCommand::Initialize { surface, responder } => {
            let result = controller.initialize(surface);
            let _ = responder.send(result);
        }
        SessionCommand::Load { target, responder } => {
            controller.load(target);
            let _ = responder.send(());
        }
        SessionCommand::LoadDeferred { target, responder } => {
            controller.load_deferred(target);
            let _ = responder.send(());
        }
        SessionCommand::Play { responder } => {
            controller.play();
            let _ = responder.send(());
        }
        SessionCommand::Pause { responder } => {
            controller.pause();
            let _ = responder.send(());
        }
        SessionCommand::Seek {
            time_sec,
            responder,
        } => {
            controller.seek(time_sec);
            let _ = responder.send(());
        }
        SessionCommand::SetThrottle { profile, responder } => {
            controller.set_throttle(profile);
            let _ = responder.send(());
        }
        SessionCommand::SetThrottleByName { name, responder } => {
            let profile = controller.set_throttle_by_name(&name);
            let _ = responder.send(profile);
        }
        SessionCommand::SetQualityLevel {
            selection,
            responder,
        } => {
            controller.set_quality_level(selection);
            let _ = responder.send(());
        }
        SessionCommand::StartMetrics {
            interval,
            responder,
        } => {
            let interval = controller.start_metrics_update(interval);
            let _ = responder.send(interval);
        }
        SessionCommand::StopMetrics { responder } => {
            controller.stop_metrics_update();
            let _ = responder.send(());
        }
        SessionCommand::ReportPlayback {
            position,
            responder,
        } => {
            controller.report_playback(position);
            let _ = responder.send(());
        }
        SessionCommand::OnMetrics { observer } => controller.on_metrics(observer),
        SessionCommand::OnLog { observer } => controller.on_log(observer),
        SessionCommand::OnManifest { observer } => controller.on_manifest(observer),
        SessionCommand::OnSegments { observer } => controller.on_segments(observer),
        SessionCommand::OnPlayback { observer } => controller.on_playback(observer),
        SessionCommand::GetState { responder } => {
            let _ = responder.send(controller.state());
        }
        SessionCommand::GetMetrics { responder } => {
            let _ = responder.send(controller.metrics());
        }
        SessionCommand::GetSegments { responder } => {
            let _ = responder.send(controller.segments());
        }
        SessionCommand::GetLogs { responder } => {
            let _ = responder.send(controller.logs());
        }
        SessionCommand::GetLifecycle { responder } => {
            let _ = responder.send(controller.lifecycle());
        }
        SessionCommand::GetCurrentTime { responder } => {
            let _ = responder.send(controller.current_time());
        }
        SessionCommand::GetThrottle { responder } => {
            let _ = responder.send(controller.throttle());
        }
        SessionCommand::GetActiveTimers { responder } => {
            let _ = responder.send(controller.active_timers());
        }
        SessionCommand::Destroy { responder } => {
            let surface = controller.destroy();
            let _ = responder.send(surface);
        }
    }
}

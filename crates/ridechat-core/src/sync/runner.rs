//! Background polling task for one conversation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::engine::{ConversationSyncEngine, PollReport, SendReport, SyncError};
use super::store::RemoteConversationStore;
use crate::cache::LocalDurableCache;
use crate::state::ConversationSnapshot;

/// Base polling period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const COMMAND_BUFFER: usize = 32;

/// Timer settings for [`spawn_sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Backoff ceiling after consecutive failures; `None` keeps the fixed interval.
    pub max_backoff: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_backoff: None,
        }
    }
}

impl PollConfig {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_backoff: None,
        }
    }

    #[must_use]
    pub const fn with_max_backoff(mut self, max_backoff: Option<Duration>) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Delay before the next poll after `failures` consecutive failed polls.
    ///
    /// Doubles per failure up to the ceiling, never dropping below the base interval.
    #[must_use]
    pub fn delay_after_failures(&self, failures: u32) -> Duration {
        match self.max_backoff {
            Some(ceiling) if failures > 0 => {
                let factor = 2_u32.saturating_pow(failures.min(16));
                self.interval
                    .saturating_mul(factor)
                    .min(ceiling)
                    .max(self.interval)
            }
            _ => self.interval,
        }
    }
}

enum Command {
    Send {
        contents: String,
        reply: oneshot::Sender<Result<SendReport, SyncError>>,
    },
    PollNow {
        reply: oneshot::Sender<Result<PollReport, SyncError>>,
    },
}

/// Handle to a running conversation sync task.
///
/// Dropping the handle stops the task; use [`SyncHandle::shutdown`] to also
/// wait for it to finish.
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
    shutdown: Option<oneshot::Sender<()>>,
    snapshots: watch::Receiver<ConversationSnapshot>,
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

/// Start polling `engine` on its own task.
///
/// The first poll runs immediately; each later poll is scheduled one period
/// after the previous one completes. Sends and polls are serialized on the task.
pub fn spawn_sync<R, C>(engine: ConversationSyncEngine<R, C>, config: PollConfig) -> SyncHandle
where
    R: RemoteConversationStore + Send + Sync + 'static,
    C: LocalDurableCache + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
    let active = engine.activity_flag();

    tracing::debug!(
        "Starting sync for conversation {} every {:?}",
        engine.conversation_id(),
        config.interval
    );
    let task = tokio::spawn(run(engine, config, command_rx, shutdown_rx, snapshot_tx));

    SyncHandle {
        commands: command_tx,
        shutdown: Some(shutdown_tx),
        snapshots: snapshot_rx,
        active,
        task: Some(task),
    }
}

impl SyncHandle {
    /// Queue a send behind any in-progress poll and wait for its outcome.
    pub async fn send_message(&self, contents: impl Into<String>) -> Result<SendReport, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send {
                contents: contents.into(),
                reply,
            })
            .await
            .map_err(|_| SyncError::Closed)?;
        response.await.map_err(|_| SyncError::Closed)?
    }

    /// Poll now instead of waiting for the timer. The timer restarts afterwards.
    pub async fn poll_now(&self) -> Result<PollReport, SyncError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::PollNow { reply })
            .await
            .map_err(|_| SyncError::Closed)?;
        response.await.map_err(|_| SyncError::Closed)?
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop the timer and wait for the task to exit.
    ///
    /// A remote call still in flight is abandoned and its result never merged.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!("Sync task ended abnormally: {}", error);
            }
        }
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run<R, C>(
    mut engine: ConversationSyncEngine<R, C>,
    config: PollConfig,
    mut commands: mpsc::Receiver<Command>,
    mut shutdown: oneshot::Receiver<()>,
    snapshots: watch::Sender<ConversationSnapshot>,
) where
    R: RemoteConversationStore,
    C: LocalDurableCache,
{
    let mut failures: u32 = 0;
    let timer = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            command = commands.recv() => match command {
                Some(Command::Send { contents, reply }) => {
                    let Some(result) = unless_shutdown(&mut shutdown, engine.send_message(&contents)).await else {
                        break;
                    };
                    publish(&snapshots, &engine);
                    let _ = reply.send(result);
                }
                Some(Command::PollNow { reply }) => {
                    let Some(result) = unless_shutdown(&mut shutdown, engine.poll()).await else {
                        break;
                    };
                    failures = next_failures(failures, &result);
                    publish(&snapshots, &engine);
                    let _ = reply.send(result);
                    timer.as_mut().reset(Instant::now() + config.delay_after_failures(failures));
                }
                None => break,
            },
            () = &mut timer => {
                let Some(result) = unless_shutdown(&mut shutdown, engine.poll()).await else {
                    break;
                };
                if matches!(result, Err(SyncError::Closed)) {
                    break;
                }
                failures = next_failures(failures, &result);
                publish(&snapshots, &engine);
                timer.as_mut().reset(Instant::now() + config.delay_after_failures(failures));
            }
        }
    }

    engine.close();
    publish(&snapshots, &engine);
    tracing::debug!("Stopped sync for conversation {}", engine.conversation_id());
}

/// Run `work` unless shutdown is requested first; abandoning it discards its result.
async fn unless_shutdown<T>(
    shutdown: &mut oneshot::Receiver<()>,
    work: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = shutdown => None,
        output = work => Some(output),
    }
}

fn next_failures(failures: u32, result: &Result<PollReport, SyncError>) -> u32 {
    match result {
        Ok(_) => 0,
        Err(_) => failures.saturating_add(1),
    }
}

fn publish<R, C>(snapshots: &watch::Sender<ConversationSnapshot>, engine: &ConversationSyncEngine<R, C>)
where
    R: RemoteConversationStore,
    C: LocalDurableCache,
{
    let next = engine.snapshot();
    snapshots.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

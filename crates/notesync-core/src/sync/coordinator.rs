//! The per-document sync task and the handle used to drive it

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{AbortHandle, JoinError, JoinHandle, JoinSet};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use super::conflict::{self, Resolution};
use super::phase::{poll_change, PollChange, SyncPhase};
use crate::clock::{Clock, SystemClock};
use crate::config::SyncSettings;
use crate::db::StorageBackend;
use crate::diagnostics::FailureKind;
use crate::error::{Error, Result};
use crate::history::{HistoryEntry, VersionHistory};
use crate::models::{Document, DocumentId, Mode, Snapshot, SnapshotId};
use crate::remote::{PushMessage, RemoteDocument, RemoteStore};
use crate::store::{DurableStore, SaveStatus};

const COMMAND_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Edit(String, Reply<()>),
    Touch,
    SetMode(Mode, Reply<Result<()>>),
    SetVisibility(bool),
    ReceiveRemote(RemoteDocument, Reply<Resolution>),
    SyncNow(Reply<Result<Option<Resolution>>>),
    Save {
        force: bool,
        reply: Reply<Result<SaveOutcome>>,
    },
    Flush(Reply<SaveStatus>),
    Restore(SnapshotId, Reply<Result<Document>>),
    History(Reply<Result<Vec<HistoryEntry>>>),
    Discard(SnapshotId, Reply<Result<bool>>),
    Shutdown(Reply<()>),
}

/// Result of an explicit save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Snapshot recorded by this save; `None` when nothing changed
    pub snapshot: Option<Snapshot>,
    pub status: SaveStatus,
}

enum TaskOutcome {
    Fetched(Result<Option<RemoteDocument>>),
    Pushed(Result<()>),
    Persisted(SaveStatus),
}

/// Builder for a document's sync task.
///
/// `spawn` loads the document (local store first, then the seed) and starts
/// the task that owns the in-memory copy and every timer.
pub struct SyncCoordinator<B, R> {
    document_id: DocumentId,
    store: Arc<DurableStore<B>>,
    remote: Arc<R>,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
    seed: Option<(String, Mode)>,
    visible: bool,
}

impl<B: StorageBackend, R: RemoteStore> SyncCoordinator<B, R> {
    pub fn new(document_id: DocumentId, store: Arc<DurableStore<B>>, remote: Arc<R>) -> Self {
        Self {
            document_id,
            store,
            remote,
            settings: SyncSettings::default(),
            clock: Arc::new(SystemClock),
            seed: None,
            visible: true,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Content supplied by the host page, used only when the store has none
    #[must_use]
    pub fn with_seed(mut self, content: impl Into<String>, mode: Mode) -> Self {
        self.seed = Some((content.into(), mode));
        self
    }

    /// Initial page visibility (defaults to visible)
    #[must_use]
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Load the document and start the sync task
    pub async fn spawn(self) -> SyncHandle {
        let document = self.initial_document().await;
        tracing::debug!(
            document = %self.document_id,
            updated_at = document.updated_at,
            "Starting sync coordinator"
        );

        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let (mirror, mirror_rx) = watch::channel(document.clone());
        let status = self.store.watch_status();

        let worker = Worker {
            history: VersionHistory::new(Arc::clone(&self.store), self.document_id.clone()),
            document,
            mirror,
            store: self.store,
            remote: self.remote,
            settings: self.settings,
            clock: self.clock,
            visible: self.visible,
            last_activity: None,
            phase: SyncPhase::Idle {
                visible: self.visible,
            },
            poll: None,
            broadcast_at: None,
            persist_at: None,
            tasks: JoinSet::new(),
            fetch_in_flight: false,
            persist_task: None,
            persist_again: false,
        };
        let task = tokio::spawn(worker.run(receiver));

        SyncHandle {
            document_id: self.document_id,
            commands,
            document: mirror_rx,
            status,
            task,
        }
    }

    async fn initial_document(&self) -> Document {
        let stored = self.store.get(&self.document_id).await;
        match (stored, &self.seed) {
            (Some(document), _) if !document.is_empty() => document,
            (stored, Some((content, mode))) => Document {
                id: self.document_id.clone(),
                content: content.clone(),
                mode: *mode,
                updated_at: stored.map_or(0, |document| document.updated_at),
            },
            (stored, None) => stored.unwrap_or_else(|| Document::empty(self.document_id.clone())),
        }
    }
}

/// Handle to a running sync task.
///
/// Dropping every handle stops the task, as does [`SyncHandle::shutdown`].
pub struct SyncHandle {
    document_id: DocumentId,
    commands: mpsc::Sender<Command>,
    document: watch::Receiver<Document>,
    status: watch::Receiver<SaveStatus>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub const fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Current in-memory document
    pub fn document(&self) -> Document {
        self.document.borrow().clone()
    }

    /// Watch the in-memory document
    pub fn subscribe(&self) -> watch::Receiver<Document> {
        self.document.clone()
    }

    pub fn save_status(&self) -> SaveStatus {
        *self.status.borrow()
    }

    pub fn watch_save_status(&self) -> watch::Receiver<SaveStatus> {
        self.status.clone()
    }

    /// Replace the content after a keystroke.
    ///
    /// Returns once the mirror holds the new content.
    pub async fn edit(&self, content: impl Into<String>) -> Result<()> {
        let content = content.into();
        self.request(|reply| Command::Edit(content, reply)).await
    }

    /// Record focus or a keystroke that did not change the content
    pub async fn touch(&self) -> Result<()> {
        self.send(Command::Touch).await
    }

    pub async fn set_visibility(&self, visible: bool) -> Result<()> {
        self.send(Command::SetVisibility(visible)).await
    }

    /// Switch the render mode, snapshotting the current state first
    pub async fn set_mode(&self, mode: Mode) -> Result<()> {
        self.request(|reply| Command::SetMode(mode, reply)).await?
    }

    /// Reconcile a payload pushed by the remote side
    pub async fn receive_remote(&self, payload: RemoteDocument) -> Result<Resolution> {
        self.request(|reply| Command::ReceiveRemote(payload, reply))
            .await
    }

    /// Fetch the remote copy now and reconcile it.
    ///
    /// Unlike timer polls, a network failure is returned to the caller.
    /// `None` means the remote has no copy.
    pub async fn sync_now(&self) -> Result<Option<Resolution>> {
        self.request(Command::SyncNow).await?
    }

    /// Explicit save: snapshot if changed, then persist immediately
    pub async fn save(&self) -> Result<SaveOutcome> {
        self.request(|reply| Command::Save { force: false, reply })
            .await?
    }

    /// Forced snapshot followed by an immediate persist
    pub async fn checkpoint(&self) -> Result<SaveOutcome> {
        self.request(|reply| Command::Save { force: true, reply })
            .await?
    }

    /// Persist now and send any pending broadcast, skipping both debounces
    pub async fn flush(&self) -> Result<SaveStatus> {
        self.request(Command::Flush).await
    }

    /// Make a snapshot's content current under a fresh timestamp
    pub async fn restore(&self, snapshot_id: SnapshotId) -> Result<Document> {
        self.request(|reply| Command::Restore(snapshot_id, reply))
            .await?
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.request(Command::History).await?
    }

    pub async fn discard(&self, snapshot_id: SnapshotId) -> Result<bool> {
        self.request(|reply| Command::Discard(snapshot_id, reply))
            .await?
    }

    /// Cancel every timer and in-flight task, then wait for the task to exit.
    ///
    /// Edits still inside the persistence debounce are not written; call
    /// [`SyncHandle::flush`] first to keep them.
    pub async fn shutdown(self) {
        if self.request(Command::Shutdown).await.is_err() {
            tracing::debug!(document = %self.document_id, "Sync coordinator already stopped");
        }
        if let Err(error) = self.task.await {
            tracing::error!(document = %self.document_id, %error, "Sync coordinator task failed");
        }
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::CoordinatorClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| Error::CoordinatorClosed)
    }
}

struct PollTimer {
    period: Duration,
    interval: Interval,
}

impl PollTimer {
    fn start(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }
}

/// State owned by the sync task
struct Worker<B, R> {
    document: Document,
    mirror: watch::Sender<Document>,
    store: Arc<DurableStore<B>>,
    history: VersionHistory<B>,
    remote: Arc<R>,
    settings: SyncSettings,
    clock: Arc<dyn Clock>,
    visible: bool,
    last_activity: Option<Instant>,
    phase: SyncPhase,
    poll: Option<PollTimer>,
    broadcast_at: Option<Instant>,
    persist_at: Option<Instant>,
    tasks: JoinSet<TaskOutcome>,
    fetch_in_flight: bool,
    persist_task: Option<AbortHandle>,
    /// A persist came due while another was still running
    persist_again: bool,
}

impl<B: StorageBackend, R: RemoteStore> Worker<B, R> {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut tick = time::interval(self.settings.activity_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.start_fetch();
        self.reevaluate();

        let ack = loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        break None;
                    };
                    if let ControlFlow::Break(ack) = self.handle(command).await {
                        break Some(ack);
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    self.on_task(joined);
                }
                () = deadline_elapsed(self.persist_at) => {
                    self.persist_at = None;
                    self.start_persist();
                }
                () = deadline_elapsed(self.broadcast_at) => {
                    self.broadcast_at = None;
                    self.start_broadcast();
                }
                () = next_poll(&mut self.poll) => self.start_fetch(),
                _ = tick.tick() => self.reevaluate(),
            }
        };

        self.cancel_pending();
        self.tasks.abort_all();
        tracing::debug!(document = %self.document.id, "Sync coordinator stopped");
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    async fn handle(&mut self, command: Command) -> ControlFlow<Reply<()>> {
        match command {
            Command::Edit(content, reply) => {
                self.edit(content);
                let _ = reply.send(());
            }
            Command::Touch => self.mark_activity(),
            Command::SetMode(mode, reply) => {
                let _ = reply.send(self.set_mode(mode).await);
            }
            Command::SetVisibility(visible) => {
                self.visible = visible;
                self.reevaluate();
            }
            Command::ReceiveRemote(payload, reply) => {
                let _ = reply.send(self.apply_remote(&payload));
            }
            Command::SyncNow(reply) => {
                let _ = reply.send(self.sync_now().await);
            }
            Command::Save { force, reply } => {
                let _ = reply.send(self.save(force).await);
            }
            Command::Flush(reply) => {
                let _ = reply.send(self.flush().await);
            }
            Command::Restore(snapshot_id, reply) => {
                let _ = reply.send(self.restore(&snapshot_id).await);
            }
            Command::History(reply) => {
                let _ = reply.send(self.history.list().await);
            }
            Command::Discard(snapshot_id, reply) => {
                let _ = reply.send(self.history.discard(&snapshot_id).await);
            }
            Command::Shutdown(ack) => return ControlFlow::Break(ack),
        }
        ControlFlow::Continue(())
    }

    fn is_editing(&self) -> bool {
        self.last_activity
            .is_some_and(|at| at.elapsed() < self.settings.editing_window)
    }

    /// Recompute the phase and bring the timers in line with it
    fn reevaluate(&mut self) {
        let phase = SyncPhase::from_signals(self.is_editing(), self.visible);
        if phase != self.phase {
            tracing::debug!(document = %self.document.id, ?phase, "Sync phase changed");
            self.phase = phase;
        }

        let plan = phase.plan(&self.settings);
        if !phase.is_editing() {
            self.broadcast_at = None;
        }
        match poll_change(self.poll.as_ref().map(|timer| timer.period), plan) {
            PollChange::Keep => {}
            PollChange::Start(period) => {
                tracing::debug!(document = %self.document.id, ?period, "Idle poll timer started");
                self.poll = Some(PollTimer::start(period));
            }
            PollChange::Stop => {
                tracing::debug!(document = %self.document.id, "Idle poll timer stopped");
                self.poll = None;
            }
        }
    }

    fn mark_activity(&mut self) {
        self.last_activity = Some(Instant::now());
        self.reevaluate();
    }

    fn edit(&mut self, content: String) {
        self.mark_activity();
        if content != self.document.content {
            self.document.content = content;
            self.local_write();
        }
    }

    /// Stamp, publish, and schedule persistence and broadcast of a local change
    fn local_write(&mut self) {
        self.document.updated_at = self.next_timestamp();
        self.publish();
        self.schedule_persist();
        self.schedule_broadcast();
    }

    fn next_timestamp(&self) -> i64 {
        next_timestamp(self.clock.now_millis(), self.document.updated_at)
    }

    fn publish(&self) {
        self.mirror.send_replace(self.document.clone());
    }

    fn schedule_persist(&mut self) {
        self.persist_at = Some(Instant::now() + self.settings.persist_debounce);
    }

    fn schedule_broadcast(&mut self) {
        self.broadcast_at = Some(Instant::now() + self.settings.broadcast_debounce);
    }

    /// Drop every pending timer and any write still in flight
    fn cancel_pending(&mut self) {
        self.broadcast_at = None;
        self.persist_at = None;
        self.poll = None;
        self.persist_again = false;
        if let Some(task) = self.persist_task.take() {
            task.abort();
        }
    }

    fn start_fetch(&mut self) {
        if self.fetch_in_flight {
            return;
        }
        self.fetch_in_flight = true;
        let remote = Arc::clone(&self.remote);
        let id = self.document.id.clone();
        self.tasks
            .spawn(async move { TaskOutcome::Fetched(remote.fetch(&id).await) });
    }

    fn start_broadcast(&mut self) {
        let remote = Arc::clone(&self.remote);
        let message = PushMessage::from_document(&self.document);
        self.tasks
            .spawn(async move { TaskOutcome::Pushed(remote.push(&message).await) });
    }

    fn start_persist(&mut self) {
        if self.persist_task.is_some() {
            self.persist_again = true;
            return;
        }
        let store = Arc::clone(&self.store);
        let document = self.document.clone();
        let task = self
            .tasks
            .spawn(async move { TaskOutcome::Persisted(store.put(&document).await) });
        self.persist_task = Some(task);
    }

    fn on_task(&mut self, joined: std::result::Result<TaskOutcome, JoinError>) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(error) if error.is_cancelled() => return,
            Err(error) => {
                tracing::error!(document = %self.document.id, %error, "Sync task failed");
                self.fetch_in_flight = false;
                self.persist_task = None;
                return;
            }
        };

        match outcome {
            TaskOutcome::Fetched(result) => {
                self.fetch_in_flight = false;
                match result {
                    Ok(Some(payload)) => {
                        self.apply_remote(&payload);
                    }
                    Ok(None) => {
                        tracing::debug!(document = %self.document.id, "Remote has no copy yet");
                    }
                    Err(error) => tracing::debug!(
                        document = %self.document.id,
                        kind = %FailureKind::SyncUnreachable,
                        %error,
                        "Poll skipped"
                    ),
                }
            }
            TaskOutcome::Pushed(Ok(())) => {
                tracing::debug!(document = %self.document.id, "Broadcast sent");
            }
            TaskOutcome::Pushed(Err(error)) => tracing::debug!(
                document = %self.document.id,
                kind = %FailureKind::SyncUnreachable,
                %error,
                "Broadcast skipped"
            ),
            TaskOutcome::Persisted(status) => {
                tracing::debug!(document = %self.document.id, ?status, "Debounced persist finished");
                self.persist_task = None;
                if std::mem::take(&mut self.persist_again) {
                    self.start_persist();
                }
            }
        }
    }

    fn apply_remote(&mut self, payload: &RemoteDocument) -> Resolution {
        self.reevaluate();
        let resolution = conflict::resolve(self.phase.is_editing(), &self.document, payload);
        match resolution {
            Resolution::Adopt => {
                conflict::adopt(&mut self.document, payload);
                tracing::info!(
                    document = %self.document.id,
                    updated_at = payload.updated_at,
                    "Adopted remote update"
                );
                self.publish();
                self.schedule_persist();
            }
            Resolution::EditInProgress => {
                tracing::debug!(document = %self.document.id, "Ignored remote update while editing");
            }
            Resolution::Stale => tracing::debug!(
                document = %self.document.id,
                kind = %FailureKind::ConflictStale,
                remote = payload.updated_at,
                local = self.document.updated_at,
                "Discarded stale remote update"
            ),
            Resolution::Identical => {
                tracing::debug!(document = %self.document.id, "Remote update matches local content");
            }
        }
        resolution
    }

    async fn sync_now(&mut self) -> Result<Option<Resolution>> {
        let payload = self.remote.fetch(&self.document.id).await?;
        Ok(payload.map(|payload| self.apply_remote(&payload)))
    }

    async fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if mode == self.document.mode {
            self.mark_activity();
            return Ok(());
        }

        self.cancel_pending();
        if let Err(error) = self.history.record_if_changed(&self.document, false).await {
            self.mark_activity();
            self.schedule_persist();
            return Err(error);
        }

        tracing::info!(document = %self.document.id, %mode, "Switching mode");
        self.document.mode = mode;
        self.mark_activity();
        self.local_write();
        Ok(())
    }

    async fn restore(&mut self, snapshot_id: &SnapshotId) -> Result<Document> {
        self.cancel_pending();
        let restored = self
            .history
            .restore(snapshot_id, self.next_timestamp())
            .await;
        self.mark_activity();

        match restored {
            Ok(document) => {
                self.document = document;
                self.publish();
                self.schedule_broadcast();
                Ok(self.document.clone())
            }
            Err(error) => {
                self.schedule_persist();
                Err(error)
            }
        }
    }

    async fn save(&mut self, force: bool) -> Result<SaveOutcome> {
        let snapshot = self.history.record_if_changed(&self.document, force).await?;
        let status = self.flush().await;
        Ok(SaveOutcome { snapshot, status })
    }

    async fn flush(&mut self) -> SaveStatus {
        self.persist_at = None;
        self.persist_again = false;
        if let Some(task) = self.persist_task.take() {
            task.abort();
        }

        if self.broadcast_at.take().is_some() {
            let message = PushMessage::from_document(&self.document);
            if let Err(error) = self.remote.push(&message).await {
                tracing::debug!(
                    document = %self.document.id,
                    kind = %FailureKind::SyncUnreachable,
                    %error,
                    "Broadcast skipped"
                );
            }
        }

        self.store.put(&self.document).await
    }
}

/// Next local timestamp: wall clock, but strictly after `previous`
const fn next_timestamp(now: i64, previous: i64) -> i64 {
    if now > previous {
        now
    } else {
        previous.saturating_add(1)
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_poll(timer: &mut Option<PollTimer>) {
    match timer {
        Some(timer) => {
            timer.interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::db::{MemoryBackend, StoreHandle};
    use crate::diagnostics::SharedSink;
    use crate::remote::MemoryRemote;
    use crate::testing::{ManualClock, RecordingSink};
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    const fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn doc_id() -> DocumentId {
        DocumentId::new("widget-1")
    }

    fn remote_doc(content: &str, updated_at: i64) -> RemoteDocument {
        RemoteDocument {
            content: content.into(),
            mode: Mode::Simple,
            updated_at,
        }
    }

    struct Fixture {
        store: Arc<DurableStore<MemoryBackend>>,
        remote: Arc<MemoryRemote>,
        clock: ManualClock,
        sink: Arc<RecordingSink>,
    }

    impl Fixture {
        fn new() -> Self {
            let sink = Arc::new(RecordingSink::default());
            let shared: SharedSink = sink.clone();
            let handle = Arc::new(StoreHandle::from_backend(MemoryBackend::new()));
            Self {
                store: Arc::new(DurableStore::new(handle, RetryPolicy::default(), shared)),
                remote: Arc::new(MemoryRemote::new()),
                clock: ManualClock::at(1_000),
                sink,
            }
        }

        fn coordinator(&self) -> SyncCoordinator<MemoryBackend, MemoryRemote> {
            SyncCoordinator::new(doc_id(), Arc::clone(&self.store), Arc::clone(&self.remote))
                .with_clock(self.clock.clone())
        }

        async fn stored(&self, content: &str, updated_at: i64) {
            let document = Document {
                id: doc_id(),
                content: content.into(),
                mode: Mode::Simple,
                updated_at,
            };
            assert_eq!(self.store.put(&document).await, SaveStatus::Success);
        }
    }

    #[test]
    fn timestamps_strictly_increase() {
        assert_eq!(next_timestamp(1_000, 10), 1_000);
        assert_eq!(next_timestamp(1_000, 1_000), 1_001);
        assert_eq!(next_timestamp(500, 1_000), 1_001);
    }

    #[tokio::test(start_paused = true)]
    async fn typed_note_survives_reload() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;
        assert!(handle.document().is_empty());

        handle.edit("Hello").await.unwrap();
        sleep(ms(500)).await;
        assert!(fx.store.get(&doc_id()).await.is_none());

        sleep(ms(400)).await;
        handle.shutdown().await;

        let reloaded = fx.coordinator().spawn().await;
        assert_eq!(reloaded.document().content, "Hello");
        assert_eq!(reloaded.document().updated_at, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn seed_fills_an_empty_store_only() {
        let fx = Fixture::new();
        let seeded = fx.coordinator().with_seed("from host", Mode::Rich).spawn().await;
        assert_eq!(seeded.document().content, "from host");
        assert_eq!(seeded.document().mode, Mode::Rich);
        assert_eq!(seeded.document().updated_at, 0);
        seeded.shutdown().await;

        fx.stored("local copy", 10).await;
        let handle = fx.coordinator().with_seed("from host", Mode::Rich).spawn().await;
        assert_eq!(handle.document().content, "local copy");
    }

    #[tokio::test(start_paused = true)]
    async fn remote_is_ignored_while_editing() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;

        handle.edit("local").await.unwrap();
        let resolution = handle
            .receive_remote(remote_doc("remote", i64::MAX / 2))
            .await
            .unwrap();

        assert_eq!(resolution, Resolution::EditInProgress);
        assert_eq!(handle.document().content, "local");
    }

    #[tokio::test(start_paused = true)]
    async fn idle_widget_adopts_and_persists_newer_remote() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;

        let resolution = handle
            .receive_remote(remote_doc("remote", 5_000))
            .await
            .unwrap();
        assert_eq!(resolution, Resolution::Adopt);
        assert_eq!(handle.document().content, "remote");
        assert_eq!(handle.document().updated_at, 5_000);

        sleep(ms(900)).await;
        let stored = fx.store.get(&doc_id()).await.unwrap();
        assert_eq!(stored.content, "remote");
    }

    #[tokio::test(start_paused = true)]
    async fn last_writer_wins_on_timestamp() {
        let fx = Fixture::new();
        fx.stored("A", 10).await;
        let handle = fx.coordinator().spawn().await;

        let stale = handle.receive_remote(remote_doc("B", 5)).await.unwrap();
        assert_eq!(stale, Resolution::Stale);
        assert_eq!(handle.document().content, "A");
        assert_eq!(handle.document().updated_at, 10);

        let newer = handle.receive_remote(remote_doc("B", 15)).await.unwrap();
        assert_eq!(newer, Resolution::Adopt);
        assert_eq!(handle.document().content, "B");
        assert_eq!(handle.document().updated_at, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_merges_newer_remote_copy() {
        let fx = Fixture::new();
        fx.remote.insert(doc_id(), remote_doc("elsewhere", 50));

        let handle = fx.coordinator().spawn().await;
        sleep(ms(10)).await;

        assert_eq!(handle.document().content, "elsewhere");
        assert_eq!(fx.remote.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_poll_picks_up_remote_changes() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;
        sleep(ms(100)).await;

        fx.remote.insert(doc_id(), remote_doc("other device", 5_000));
        sleep(ms(800)).await;

        assert_eq!(handle.document().content, "other device");
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_page_polls_slower_without_duplicate_timers() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;

        // Startup fetch plus polls at 800, 1600, 2400
        sleep(ms(2_500)).await;
        assert_eq!(fx.remote.fetches(), 4);

        // Next polls at 7500 and 12500
        handle.set_visibility(false).await.unwrap();
        sleep(ms(10_050)).await;
        assert_eq!(fx.remote.fetches(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn editing_pauses_polling_and_debounces_broadcast() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;
        sleep(ms(100)).await;
        assert_eq!(fx.remote.fetches(), 1);

        for i in 0..15 {
            handle.edit(format!("draft {i}")).await.unwrap();
            sleep(ms(200)).await;
        }
        assert_eq!(fx.remote.fetches(), 1);
        assert_eq!(fx.remote.pushes(), 0);

        sleep(ms(200)).await;
        assert_eq!(fx.remote.pushes(), 1);
        assert_eq!(fx.remote.document(&doc_id()).unwrap().content, "draft 14");
    }

    #[tokio::test(start_paused = true)]
    async fn mode_switch_snapshots_previous_state() {
        let fx = Fixture::new();
        fx.stored("draft", 10).await;
        let handle = fx.coordinator().spawn().await;

        handle.set_mode(Mode::Rich).await.unwrap();

        let history = handle.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].snapshot.mode, Mode::Simple);
        assert_eq!(history[0].snapshot.content, "draft");

        let document = handle.document();
        assert_eq!(document.mode, Mode::Rich);
        assert_eq!(document.updated_at, 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_beats_pending_writes_and_stale_remote() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;

        handle.edit("v1").await.unwrap();
        let saved = handle.save().await.unwrap();
        assert_eq!(saved.status, SaveStatus::Success);
        let snapshot = saved.snapshot.unwrap();

        handle.edit("v2").await.unwrap();
        assert_eq!(handle.document().updated_at, 1_001);

        let restored = handle.restore(snapshot.id.clone()).await.unwrap();
        assert_eq!(restored.content, "v1");
        assert_eq!(restored.updated_at, 1_002);

        // The debounced "v2" write must not land after the restore
        sleep(ms(2_000)).await;
        let stored = fx.store.get(&doc_id()).await.unwrap();
        assert_eq!(stored.content, "v1");
        assert_eq!(stored.updated_at, 1_002);
        assert_eq!(fx.remote.document(&doc_id()).unwrap().content, "v1");

        let late = handle.receive_remote(remote_doc("v2", 1_001)).await.unwrap();
        assert_eq!(late, Resolution::Stale);
        assert_eq!(handle.document().content, "v1");

        // The snapshot is kept
        assert_eq!(handle.history().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn save_dedups_but_checkpoint_always_snapshots() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;
        handle.edit("note").await.unwrap();

        assert!(handle.save().await.unwrap().snapshot.is_some());
        assert!(handle.save().await.unwrap().snapshot.is_none());
        assert!(handle.checkpoint().await.unwrap().snapshot.is_some());

        let history = handle.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(handle.discard(history[0].snapshot.id.clone()).await.unwrap());
        assert_eq!(handle.history().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn save_after_discarding_the_only_snapshot_records_again() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;
        handle.edit("keep me").await.unwrap();

        let first = handle.save().await.unwrap().snapshot.unwrap();
        assert!(handle.discard(first.id).await.unwrap());

        let second = handle.save().await.unwrap().snapshot.unwrap();
        assert_eq!(second.content, "keep me");
        assert_eq!(handle.history().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stamps_keep_rising_when_the_wall_clock_goes_back() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;

        handle.edit("a").await.unwrap();
        assert_eq!(handle.document().updated_at, 1_000);

        fx.clock.set(5_000);
        handle.edit("b").await.unwrap();
        assert_eq!(handle.document().updated_at, 5_000);

        fx.clock.set(2_000);
        handle.edit("c").await.unwrap();
        assert_eq!(handle.document().updated_at, 5_001);
        handle.set_mode(Mode::Rich).await.unwrap();
        assert_eq!(handle.document().updated_at, 5_002);

        // A remote copy stamped by the lagging clock loses
        let late = handle.receive_remote(remote_doc("remote", 2_500)).await.unwrap();
        assert_eq!(late, Resolution::Stale);
        assert_eq!(handle.document().content, "c");
    }

    #[tokio::test(start_paused = true)]
    async fn flush_skips_the_debounce() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;

        handle.edit("now").await.unwrap();
        assert_eq!(handle.flush().await.unwrap(), SaveStatus::Success);

        assert_eq!(fx.store.get(&doc_id()).await.unwrap().content, "now");
        assert_eq!(fx.remote.document(&doc_id()).unwrap().content, "now");
        assert_eq!(handle.save_status(), SaveStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_remote_changes_nothing() {
        let fx = Fixture::new();
        fx.stored("A", 10).await;
        fx.remote.set_offline(true);
        let handle = fx.coordinator().spawn().await;

        sleep(ms(3_000)).await;
        assert!(fx.remote.fetches() > 1);
        assert_eq!(handle.document().content, "A");
        assert_eq!(handle.document().updated_at, 10);
        assert_eq!(fx.store.get(&doc_id()).await.unwrap().content, "A");
        assert!(fx.sink.reports().is_empty());

        assert!(handle.sync_now().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_background_work() {
        let fx = Fixture::new();
        let handle = fx.coordinator().spawn().await;
        sleep(ms(100)).await;
        handle.shutdown().await;

        let fetches = fx.remote.fetches();
        sleep(ms(5_000)).await;
        assert_eq!(fx.remote.fetches(), fetches);
    }
}

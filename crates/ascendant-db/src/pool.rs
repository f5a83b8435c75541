//! Bounded worker pool for asynchronous persistence
//!
//! All schema checks, migrations, and row reads/writes run on dedicated
//! worker threads; the game thread submits jobs and receives a
//! [`Completion`] it can poll or wait on, never blocking in the common path.
//!
//! Jobs are routed by player-id hash, so every operation on a given holder
//! lands on the same worker and is serialized against that holder's other
//! operations. Schema work is pinned to worker 0. Queues are bounded: a full
//! queue surfaces [`Error::Busy`] instead of blocking the caller.

use crate::error::{Error, Result};
use crate::gate::SchemaGates;
use crate::models::HolderSnapshot;
use crate::schema::SchemaRegistry;
use crate::store::Store;
use ascendant_core::{FlushReceipt, PlayerId, ProgressionConfig, ProgressionHolder};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

/// Worker-pool sizing
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    workers: usize,
    queue_depth: usize,
}

impl PoolConfig {
    /// Create a configuration with the given worker count
    ///
    /// The count is clamped to `[1, available cores]`.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.clamp(1, num_cpus::get().max(1)),
            ..Self::default()
        }
    }

    /// Set the per-worker queue bound
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth.max(1);
        self
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Per-worker queue bound
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }
}

impl Default for PoolConfig {
    /// Single worker with a modest queue
    fn default() -> Self {
        Self {
            workers: 1,
            queue_depth: 64,
        }
    }
}

/// Handle to an in-flight persistence operation
///
/// Resolves with the operation's success value or failure reason. Dropping
/// the handle abandons the result without cancelling the work.
pub struct Completion<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Completion<T> {
    /// Block until the operation resolves (tests and shutdown paths)
    pub fn wait(self) -> Result<T> {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(Error::WorkerGone),
        }
    }

    /// Non-blocking poll; `None` while the operation is still in flight
    ///
    /// A worker that died before replying resolves to [`Error::WorkerGone`]
    /// rather than staying in flight forever.
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(Err(Error::WorkerGone)),
        }
    }
}

enum Job {
    EnsureSchema {
        reply: mpsc::Sender<Result<()>>,
    },
    LoadHolder {
        player: PlayerId,
        reply: mpsc::Sender<Result<ProgressionHolder>>,
    },
    Flush {
        snapshot: HolderSnapshot,
        reply: mpsc::Sender<Result<FlushReceipt>>,
    },
    PurgePlayer {
        player: PlayerId,
        reply: mpsc::Sender<Result<()>>,
    },
    /// Holds the worker until released, so tests can fill its queue
    #[cfg(test)]
    Stall {
        started: mpsc::Sender<()>,
        release: Receiver<()>,
    },
}

struct Worker {
    sender: Option<SyncSender<Job>>,
    handle: Option<JoinHandle<()>>,
}

/// The persistence worker pool
pub struct PersistencePool {
    workers: Vec<Worker>,
    gates: Arc<SchemaGates>,
}

impl PersistencePool {
    /// Open the database and spawn the workers
    ///
    /// Each worker owns its own connection; the admission gates are shared.
    /// Call [`PersistencePool::ensure_schema`] before issuing queries.
    pub fn open(
        path: impl AsRef<Path>,
        progression: ProgressionConfig,
        config: PoolConfig,
    ) -> Result<Self> {
        let registry = SchemaRegistry::managed();
        let gates = Arc::new(SchemaGates::for_tables(&registry.table_names()));

        let mut workers = Vec::with_capacity(config.workers());
        for index in 0..config.workers() {
            let store = Store::open(path.as_ref(), gates.clone())?;
            let progression = progression.clone();
            let (sender, receiver) = mpsc::sync_channel(config.queue_depth());
            let handle = std::thread::Builder::new()
                .name(format!("ascendant-db-{index}"))
                .spawn(move || worker_loop(index, store, progression, receiver))?;
            workers.push(Worker {
                sender: Some(sender),
                handle: Some(handle),
            });
        }
        Ok(Self { workers, gates })
    }

    /// The shared admission gates
    pub fn gates(&self) -> &Arc<SchemaGates> {
        &self.gates
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Converge the schema on worker 0
    pub fn ensure_schema(&self) -> Result<Completion<()>> {
        let (reply, rx) = mpsc::channel();
        self.submit(0, Job::EnsureSchema { reply })?;
        Ok(Completion { rx })
    }

    /// Load (or default) a player's holder on that player's worker
    pub fn load_holder(&self, player: PlayerId) -> Result<Completion<ProgressionHolder>> {
        let (reply, rx) = mpsc::channel();
        self.submit(self.worker_for(player), Job::LoadHolder { player, reply })?;
        Ok(Completion { rx })
    }

    /// Flush a holder's dirty state
    ///
    /// The snapshot is captured on the calling thread; on success the
    /// completion resolves with the receipt to hand to
    /// `ProgressionHolder::acknowledge_flush`.
    pub fn flush_holder(&self, holder: &ProgressionHolder) -> Result<Completion<FlushReceipt>> {
        let snapshot = HolderSnapshot::dirty_of(holder);
        let (reply, rx) = mpsc::channel();
        self.submit(
            self.worker_for(snapshot.player),
            Job::Flush { snapshot, reply },
        )?;
        Ok(Completion { rx })
    }

    /// Delete every stored row for a player
    pub fn purge_player(&self, player: PlayerId) -> Result<Completion<()>> {
        let (reply, rx) = mpsc::channel();
        self.submit(self.worker_for(player), Job::PurgePlayer { player, reply })?;
        Ok(Completion { rx })
    }

    /// Single-writer-per-holder: a player's jobs always hit the same worker
    fn worker_for(&self, player: PlayerId) -> usize {
        (player.raw().as_u128() % self.workers.len() as u128) as usize
    }

    fn submit(&self, worker: usize, job: Job) -> Result<()> {
        let sender = self.workers[worker]
            .sender
            .as_ref()
            .ok_or(Error::WorkerGone)?;
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Busy),
            Err(TrySendError::Disconnected(_)) => Err(Error::WorkerGone),
        }
    }
}

impl Drop for PersistencePool {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.sender.take();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn worker_loop(
    index: usize,
    store: Store,
    progression: ProgressionConfig,
    receiver: Receiver<Job>,
) {
    debug!(worker = index, "persistence worker started");
    while let Ok(job) = receiver.recv() {
        // A dropped reply receiver means the caller abandoned the result
        match job {
            Job::EnsureSchema { reply } => {
                let _ = reply.send(store.ensure_schema());
            }
            Job::LoadHolder { player, reply } => {
                let _ = reply.send(store.load_holder(player, &progression));
            }
            Job::Flush { snapshot, reply } => {
                let _ = reply.send(store.flush(&snapshot));
            }
            Job::PurgePlayer { player, reply } => {
                let _ = reply.send(store.purge_player(player));
            }
            #[cfg(test)]
            Job::Stall { started, release } => {
                let _ = started.send(());
                let _ = release.recv();
            }
        }
    }
    debug!(worker = index, "persistence worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ascendant_core::{AbilityKey, GainReason, NoopHook, SkillKind};
    use tempfile::TempDir;

    fn open_pool(workers: usize) -> (TempDir, PersistencePool) {
        let dir = TempDir::new().unwrap();
        let pool = PersistencePool::open(
            dir.path().join("progression.db"),
            ProgressionConfig::default(),
            PoolConfig::with_workers(workers),
        )
        .unwrap();
        (dir, pool)
    }

    #[test]
    fn test_config_clamps_workers() {
        assert_eq!(PoolConfig::with_workers(0).workers(), 1);
        let many = PoolConfig::with_workers(4096).workers();
        assert!(many >= 1 && many <= num_cpus::get().max(1));
    }

    #[test]
    fn test_query_before_ensure_rejected() {
        let (_dir, pool) = open_pool(1);
        let err = pool.load_holder(PlayerId::random()).unwrap().wait().unwrap_err();
        assert!(matches!(err, Error::SchemaNotReady { .. }));
    }

    #[test]
    fn test_ensure_then_round_trip() {
        let (_dir, pool) = open_pool(2);
        pool.ensure_schema().unwrap().wait().unwrap();
        assert!(pool.gates().all_ready());

        let player = PlayerId::random();
        let mut holder = pool.load_holder(player).unwrap().wait().unwrap();
        holder.gain_experience(SkillKind::Woodcutting, 400, GainReason::Gathering, &NoopHook);
        holder.toggle(&AbilityKey::new("tree_feller")).unwrap();

        let receipt = pool.flush_holder(&holder).unwrap().wait().unwrap();
        holder.acknowledge_flush(&receipt);
        assert!(!holder.is_dirty());

        let loaded = pool.load_holder(player).unwrap().wait().unwrap();
        assert_eq!(
            loaded.skill(SkillKind::Woodcutting).current_level(),
            holder.skill(SkillKind::Woodcutting).current_level()
        );
        assert!(!loaded.ability(&AbilityKey::new("tree_feller")).unwrap().toggled());
    }

    #[test]
    fn test_ensure_schema_idempotent_across_pool() {
        let (_dir, pool) = open_pool(1);
        pool.ensure_schema().unwrap().wait().unwrap();
        pool.ensure_schema().unwrap().wait().unwrap();
        assert!(pool.gates().all_ready());
    }

    #[test]
    fn test_purge_via_pool() {
        let (_dir, pool) = open_pool(2);
        pool.ensure_schema().unwrap().wait().unwrap();

        let player = PlayerId::random();
        let mut holder = pool.load_holder(player).unwrap().wait().unwrap();
        holder.gain_experience(SkillKind::Swords, 1000, GainReason::Combat, &NoopHook);
        pool.flush_holder(&holder).unwrap().wait().unwrap();

        pool.purge_player(player).unwrap().wait().unwrap();
        let loaded = pool.load_holder(player).unwrap().wait().unwrap();
        assert_eq!(loaded.power_level(), 0);
    }

    #[test]
    fn test_full_queue_surfaces_busy() {
        let dir = TempDir::new().unwrap();
        let pool = PersistencePool::open(
            dir.path().join("progression.db"),
            ProgressionConfig::default(),
            PoolConfig::with_workers(1).with_queue_depth(1),
        )
        .unwrap();

        let (started, started_rx) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        pool.submit(
            0,
            Job::Stall {
                started,
                release: release_rx,
            },
        )
        .unwrap();
        started_rx.recv().unwrap();

        // Worker is held; one more job fits the queue, the next is rejected
        let (reply, _pending) = mpsc::channel();
        pool.submit(0, Job::EnsureSchema { reply }).unwrap();
        let (reply, _rejected) = mpsc::channel();
        let err = pool.submit(0, Job::EnsureSchema { reply }).unwrap_err();
        assert!(matches!(err, Error::Busy));

        release.send(()).unwrap();
    }

    #[test]
    fn test_try_take_reports_dead_worker() {
        let (reply, rx) = mpsc::channel::<Result<()>>();
        drop(reply);

        let completion = Completion { rx };
        assert!(matches!(
            completion.try_take(),
            Some(Err(Error::WorkerGone))
        ));
    }

    #[test]
    fn test_completion_try_take_polls() {
        let (_dir, pool) = open_pool(1);
        let completion = pool.ensure_schema().unwrap();
        loop {
            if let Some(result) = completion.try_take() {
                result.unwrap();
                break;
            }
            std::thread::yield_now();
        }
    }
}

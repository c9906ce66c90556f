// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded pool of document-engine sessions.
//
// Sessions are created lazily up to the pool capacity and probed for liveness
// before every hand-out. When every pooled session is busy past the acquire
// timeout the caller gets a temporary session that is shut down on release
// and never enters the pool. Engine calls (create, probe, shutdown) always run
// outside the pool lock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use docwerk_core::config::ConfigReader;
use docwerk_core::error::{DocwerkError, Result};
use tracing::{debug, info, instrument, warn};

use crate::engine::{DocumentEngine, EngineFactory};

/// Hard ceiling on pooled sessions.
pub const MAX_POOL_SIZE: usize = 4;
pub const DEFAULT_POOL_SIZE: usize = 2;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
/// Longest any acquisition waits, whatever the caller asks for.
pub const MAX_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3600);

// -- Handles ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Idle,
    CheckedOut,
    Destroyed,
}

/// One engine session plus its pool bookkeeping.
pub struct EngineHandle {
    id: u64,
    engine: Box<dyn DocumentEngine>,
    pooled: bool,
    state: HandleState,
}

impl EngineHandle {
    fn new(id: u64, engine: Box<dyn DocumentEngine>, pooled: bool) -> Self {
        Self {
            id,
            engine,
            pooled,
            state: HandleState::CheckedOut,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// `false` for temporary sessions started because the pool was exhausted.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    fn destroy(mut self) {
        self.state = HandleState::Destroyed;
        self.engine.close_all_documents();
        self.engine.shutdown();
        debug!(id = self.id, pooled = self.pooled, "Engine session destroyed");
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    /// Pooled sessions alive, idle or checked out.
    pub live: usize,
    pub idle: usize,
    pub checked_out: usize,
    pub temporary_out: usize,
    pub closed: bool,
}

struct PoolState {
    idle: VecDeque<EngineHandle>,
    /// Pooled sessions alive or being created.
    live: usize,
    checked_out: usize,
    temporary_out: usize,
    closed: bool,
}

// -- Pool ---------------------------------------------------------------------

pub struct EnginePool {
    factory: Arc<dyn EngineFactory>,
    capacity: usize,
    state: Mutex<PoolState>,
    available: Condvar,
    next_id: AtomicU64,
}

impl EnginePool {
    /// Create an empty pool. `capacity` is clamped to `1..=MAX_POOL_SIZE`.
    pub fn new(factory: Arc<dyn EngineFactory>, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_POOL_SIZE);
        info!(engine = factory.name(), capacity, "Engine pool created");
        Self {
            factory,
            capacity,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                live: 0,
                checked_out: 0,
                temporary_out: 0,
                closed: false,
            }),
            available: Condvar::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a pool sized by `engine.pool_size`.
    pub fn from_config(factory: Arc<dyn EngineFactory>, config: &dyn ConfigReader) -> Self {
        let size = config
            .get_i64("engine.pool_size", DEFAULT_POOL_SIZE as i64)
            .clamp(1, MAX_POOL_SIZE as i64) as usize;
        Self::new(factory, size)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Check out a session, waiting up to `timeout` for a pooled one.
    ///
    /// Returns [`DocwerkError::PoolClosed`] once [`close`](Self::close) has
    /// run, and [`DocwerkError::EngineUnavailable`] when no session at all can
    /// be started.
    #[instrument(skip(self))]
    pub fn acquire(&self, timeout: Duration) -> Result<EngineLease<'_>> {
        let deadline = Instant::now() + timeout.min(MAX_ACQUIRE_TIMEOUT);
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(DocwerkError::PoolClosed);
            }

            if let Some(mut handle) = state.idle.pop_front() {
                handle.state = HandleState::CheckedOut;
                state.checked_out += 1;
                drop(state);

                if handle.engine.is_responsive() {
                    debug!(id = handle.id, "Reusing pooled engine session");
                    return Ok(EngineLease::new(self, handle));
                }
                warn!(id = handle.id, "Pooled engine session is unresponsive, replacing it");
                handle.destroy();
                // The slot stays reserved for the replacement.
                return self.create_pooled();
            }

            if state.live < self.capacity {
                state.live += 1;
                state.checked_out += 1;
                drop(state);
                return self.create_pooled();
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }

        drop(state);
        warn!(?timeout, "Engine pool exhausted, starting a temporary session");
        self.create_temporary()
    }

    /// Fill a reserved pooled slot. On failure the slot is given back and a
    /// temporary session is tried instead.
    fn create_pooled(&self) -> Result<EngineLease<'_>> {
        match self.factory.create() {
            Ok(engine) => {
                let handle = EngineHandle::new(self.next_id(), engine, true);
                debug!(id = handle.id, "Started pooled engine session");
                Ok(EngineLease::new(self, handle))
            }
            Err(err) => {
                warn!(error = %err, "Could not start pooled engine session");
                {
                    let mut state = self.lock();
                    state.live = state.live.saturating_sub(1);
                    state.checked_out = state.checked_out.saturating_sub(1);
                }
                self.available.notify_one();
                self.create_temporary()
            }
        }
    }

    fn create_temporary(&self) -> Result<EngineLease<'_>> {
        let engine = self.factory.create().map_err(|err| match err {
            DocwerkError::EngineUnavailable(_) => err,
            other => DocwerkError::EngineUnavailable(other.to_string()),
        })?;
        let handle = EngineHandle::new(self.next_id(), engine, false);

        let mut state = self.lock();
        if state.closed {
            drop(state);
            handle.destroy();
            return Err(DocwerkError::PoolClosed);
        }
        state.temporary_out += 1;
        drop(state);

        debug!(id = handle.id, "Started temporary engine session");
        Ok(EngineLease::new(self, handle))
    }

    /// Return a session. Open documents are closed first; the session goes
    /// back to the idle set only if it is pooled, clean, and the pool is open.
    fn release(&self, mut handle: EngineHandle) {
        handle.engine.close_all_documents();
        let clean = handle.engine.open_document_count() == 0;

        let mut state = self.lock();
        if !handle.pooled {
            state.temporary_out = state.temporary_out.saturating_sub(1);
            drop(state);
            handle.destroy();
            return;
        }

        state.checked_out = state.checked_out.saturating_sub(1);
        if !state.closed && clean && state.idle.len() < self.capacity {
            handle.state = HandleState::Idle;
            state.idle.push_back(handle);
            drop(state);
            self.available.notify_one();
            return;
        }

        if !clean {
            warn!(id = handle.id, "Engine session kept documents open, discarding it");
        }
        state.live = state.live.saturating_sub(1);
        drop(state);
        self.available.notify_one();
        handle.destroy();
    }

    /// Start idle sessions up to capacity. Returns how many were started.
    pub fn warm_up(&self) -> usize {
        let mut started = 0;
        loop {
            {
                let mut state = self.lock();
                if state.closed || state.live >= self.capacity {
                    break;
                }
                state.live += 1;
            }

            match self.factory.create() {
                Ok(engine) => {
                    let mut handle = EngineHandle::new(self.next_id(), engine, true);
                    handle.state = HandleState::Idle;
                    let mut state = self.lock();
                    if state.closed {
                        state.live = state.live.saturating_sub(1);
                        drop(state);
                        handle.destroy();
                        break;
                    }
                    state.idle.push_back(handle);
                    drop(state);
                    self.available.notify_one();
                    started += 1;
                }
                Err(err) => {
                    let mut state = self.lock();
                    state.live = state.live.saturating_sub(1);
                    drop(state);
                    warn!(error = %err, "Engine warm-up stopped");
                    break;
                }
            }
        }
        if started > 0 {
            info!(started, "Engine pool warmed up");
        }
        started
    }

    /// Shut down every idle session and refuse further acquisitions.
    /// Checked-out sessions are destroyed when they come back. Idempotent.
    pub fn close(&self) {
        let drained: Vec<EngineHandle> = {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.live = state.live.saturating_sub(drained.len());
            drained
        };
        self.available.notify_all();

        let count = drained.len();
        for handle in drained {
            handle.destroy();
        }
        info!(destroyed = count, "Engine pool closed");
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            capacity: self.capacity,
            live: state.live,
            idle: state.idle.len(),
            checked_out: state.checked_out,
            temporary_out: state.temporary_out,
            closed: state.closed,
        }
    }
}

impl Drop for EnginePool {
    fn drop(&mut self) {
        self.close();
    }
}

// -- Lease --------------------------------------------------------------------

/// A checked-out session. Returned to the pool on drop.
pub struct EngineLease<'a> {
    pool: &'a EnginePool,
    handle: Option<EngineHandle>,
}

impl<'a> EngineLease<'a> {
    fn new(pool: &'a EnginePool, handle: EngineHandle) -> Self {
        Self {
            pool,
            handle: Some(handle),
        }
    }

    fn handle(&self) -> &EngineHandle {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("lease handle taken before drop"),
        }
    }

    pub fn engine(&mut self) -> &mut dyn DocumentEngine {
        match &mut self.handle {
            Some(handle) => handle.engine.as_mut(),
            None => unreachable!("lease handle taken before drop"),
        }
    }

    pub fn handle_id(&self) -> u64 {
        self.handle().id()
    }

    pub fn is_pooled(&self) -> bool {
        self.handle().is_pooled()
    }

    pub fn state(&self) -> HandleState {
        self.handle().state()
    }

    /// Give the session back now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for EngineLease<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

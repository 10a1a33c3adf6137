/*!
 * Primitive Registry
 * Owns live primitives, assigns IDs, and feeds enumeration to diagnostics
 *
 * Every primitive a registry creates shares the registry's Collector, so
 * operation outcomes and timings land in one metrics aggregator and one
 * event stream.
 */

use super::barrier::{Barrier, BarrierAction, BarrierConfig, BarrierStats};
use super::latch::{CountdownLatch, LatchConfig, LatchStats};
use super::race::{RaceConfig, RaceDetector, RaceStats};
use super::semaphore::{Semaphore, SemaphoreConfig, SemaphoreStats};
use crate::core::errors::SyncError;
use crate::core::id::IdGenerator;
use crate::core::types::{PrimitiveId, PrimitiveKind, SyncResult};
use crate::monitoring::Collector;
use crate::pool::{PoolConfig, PoolStats, WorkerPool};
use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to any registered primitive
#[derive(Clone)]
pub enum PrimitiveHandle {
    Semaphore(Arc<Semaphore>),
    Barrier(Arc<Barrier>),
    Latch(Arc<CountdownLatch>),
    Pool(Arc<WorkerPool>),
    RaceDetector(Arc<RaceDetector>),
}

impl PrimitiveHandle {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveHandle::Semaphore(_) => PrimitiveKind::Semaphore,
            PrimitiveHandle::Barrier(_) => PrimitiveKind::Barrier,
            PrimitiveHandle::Latch(_) => PrimitiveKind::Latch,
            PrimitiveHandle::Pool(_) => PrimitiveKind::Pool,
            PrimitiveHandle::RaceDetector(_) => PrimitiveKind::RaceDetector,
        }
    }

    /// Fail-fast teardown; pending waiters get Destroyed.
    pub fn destroy(&self) {
        match self {
            PrimitiveHandle::Semaphore(sem) => sem.destroy(),
            PrimitiveHandle::Barrier(barrier) => barrier.destroy(),
            PrimitiveHandle::Latch(latch) => latch.destroy(),
            // Drain errors are already reported through the collector
            PrimitiveHandle::Pool(pool) => {
                let _ = pool.destroy();
            }
            PrimitiveHandle::RaceDetector(detector) => detector.destroy(),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        match self {
            PrimitiveHandle::Semaphore(sem) => sem.is_destroyed(),
            PrimitiveHandle::Barrier(barrier) => barrier.is_destroyed(),
            PrimitiveHandle::Latch(latch) => latch.is_destroyed(),
            PrimitiveHandle::Pool(pool) => pool.is_destroyed(),
            PrimitiveHandle::RaceDetector(detector) => detector.is_destroyed(),
        }
    }

    /// Stats snapshot in a uniform envelope for the health analyzer
    pub fn component_stats(&self) -> ComponentStats {
        match self {
            PrimitiveHandle::Semaphore(sem) => ComponentStats::Semaphore(sem.stats()),
            PrimitiveHandle::Barrier(barrier) => ComponentStats::Barrier(barrier.stats()),
            PrimitiveHandle::Latch(latch) => ComponentStats::Latch(latch.stats()),
            PrimitiveHandle::Pool(pool) => ComponentStats::Pool(pool.stats()),
            PrimitiveHandle::RaceDetector(detector) => {
                ComponentStats::RaceDetector(detector.stats())
            }
        }
    }
}

/// Per-kind stats envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentStats {
    Semaphore(SemaphoreStats),
    Barrier(BarrierStats),
    Latch(LatchStats),
    Pool(PoolStats),
    RaceDetector(RaceStats),
}

/// Registry of live coordination primitives
pub struct SyncRegistry {
    primitives: DashMap<PrimitiveId, PrimitiveHandle, RandomState>,
    ids: IdGenerator,
    collector: Collector,
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::with_collector(Collector::new())
    }

    pub fn with_collector(collector: Collector) -> Self {
        Self {
            primitives: DashMap::with_hasher(RandomState::new()),
            ids: IdGenerator::new(),
            collector,
        }
    }

    /// Collector shared by every primitive this registry creates
    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn create_semaphore(&self, config: SemaphoreConfig) -> Arc<Semaphore> {
        let id = self.ids.next_primitive();
        let sem = Semaphore::new(id, config, self.collector.clone());
        self.primitives
            .insert(id, PrimitiveHandle::Semaphore(Arc::clone(&sem)));
        sem
    }

    pub fn create_barrier(&self, config: BarrierConfig) -> Arc<Barrier> {
        self.create_barrier_with_action(config, None)
    }

    pub fn create_barrier_with_action(
        &self,
        config: BarrierConfig,
        action: Option<BarrierAction>,
    ) -> Arc<Barrier> {
        let id = self.ids.next_primitive();
        let barrier = Barrier::with_action(id, config, action, self.collector.clone());
        self.primitives
            .insert(id, PrimitiveHandle::Barrier(Arc::clone(&barrier)));
        barrier
    }

    pub fn create_latch(&self, config: LatchConfig) -> Arc<CountdownLatch> {
        let id = self.ids.next_primitive();
        let latch = CountdownLatch::new(id, config, self.collector.clone());
        self.primitives
            .insert(id, PrimitiveHandle::Latch(Arc::clone(&latch)));
        latch
    }

    pub fn create_pool(&self, config: PoolConfig) -> Arc<WorkerPool> {
        let id = self.ids.next_primitive();
        let pool = WorkerPool::new(id, config, self.collector.clone());
        self.primitives
            .insert(id, PrimitiveHandle::Pool(Arc::clone(&pool)));
        pool
    }

    pub fn create_race_detector(&self, config: RaceConfig) -> Arc<RaceDetector> {
        let id = self.ids.next_primitive();
        let detector = RaceDetector::new(id, config, self.collector.clone());
        self.primitives
            .insert(id, PrimitiveHandle::RaceDetector(Arc::clone(&detector)));
        detector
    }

    pub fn get(&self, id: PrimitiveId) -> Option<PrimitiveHandle> {
        self.primitives.get(&id).map(|entry| entry.value().clone())
    }

    /// Destroy and deregister a primitive, failing its pending waiters.
    pub fn destroy(&self, id: PrimitiveId) -> SyncResult<()> {
        match self.primitives.remove(&id) {
            Some((_, handle)) => {
                handle.destroy();
                Ok(())
            }
            None => Err(SyncError::NotFound(id.0)),
        }
    }

    /// Destroy every registered primitive.
    pub fn destroy_all(&self) {
        let ids: Vec<PrimitiveId> = self.primitives.iter().map(|e| *e.key()).collect();
        for id in ids {
            let _ = self.destroy(id);
        }
    }

    /// Drop handles whose primitive was destroyed out-of-band. Returns the
    /// number collected; run by the diagnostics recovery sweep.
    pub fn sweep_destroyed(&self) -> usize {
        let stale: Vec<PrimitiveId> = self
            .primitives
            .iter()
            .filter(|e| e.value().is_destroyed())
            .map(|e| *e.key())
            .collect();
        for id in &stale {
            self.primitives.remove(id);
        }
        if !stale.is_empty() {
            tracing::debug!(collected = stale.len(), "swept destroyed primitives");
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Enumerate stats for every live primitive (diagnostics Collect phase)
    pub fn component_stats(&self) -> Vec<(PrimitiveId, ComponentStats)> {
        self.primitives
            .iter()
            .map(|entry| (*entry.key(), entry.value().component_stats()))
            .collect()
    }
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Process-wide interpreter counters.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Point-in-time snapshot of interpreter counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VmMetricsSnapshot {
    /// Batches that ran to completion.
    pub lanes_vm_batches_total: u64,
    /// Instructions dispatched, including the one that faulted.
    pub lanes_vm_instructions_total: u64,
    /// Batches aborted by a fault.
    pub lanes_vm_faults_total: u64,
    /// Valid lanes across all started batches.
    pub lanes_vm_lanes_total: u64,
}

static LANES_VM_BATCHES_TOTAL: AtomicU64 = AtomicU64::new(0);
static LANES_VM_INSTRUCTIONS_TOTAL: AtomicU64 = AtomicU64::new(0);
static LANES_VM_FAULTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static LANES_VM_LANES_TOTAL: AtomicU64 = AtomicU64::new(0);

pub(crate) fn record_batch_started(lanes: u32) {
    LANES_VM_LANES_TOTAL.fetch_add(u64::from(lanes), AtomicOrdering::Relaxed);
}

pub(crate) fn record_batch_finished(instructions: u64) {
    LANES_VM_INSTRUCTIONS_TOTAL.fetch_add(instructions, AtomicOrdering::Relaxed);
    LANES_VM_BATCHES_TOTAL.fetch_add(1, AtomicOrdering::Relaxed);
}

pub(crate) fn record_fault(instructions: u64) {
    LANES_VM_INSTRUCTIONS_TOTAL.fetch_add(instructions, AtomicOrdering::Relaxed);
    LANES_VM_FAULTS_TOTAL.fetch_add(1, AtomicOrdering::Relaxed);
}

/// Snapshot interpreter counters.
#[must_use]
pub fn vm_metrics_snapshot() -> VmMetricsSnapshot {
    VmMetricsSnapshot {
        lanes_vm_batches_total: LANES_VM_BATCHES_TOTAL.load(AtomicOrdering::Relaxed),
        lanes_vm_instructions_total: LANES_VM_INSTRUCTIONS_TOTAL.load(AtomicOrdering::Relaxed),
        lanes_vm_faults_total: LANES_VM_FAULTS_TOTAL.load(AtomicOrdering::Relaxed),
        lanes_vm_lanes_total: LANES_VM_LANES_TOTAL.load(AtomicOrdering::Relaxed),
    }
}

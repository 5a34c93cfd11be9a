//! The two passes run over every active network each processing tick.
//!
//! 1. **Collect**: every `Done` machine's output is moved into the pool.
//!    Items leave the machine only after the pool accepted them, and only as
//!    many as were stored.
//! 2. **Feed**: every machine that wants input is offered the pool, in order,
//!    until the pool runs dry.
//!
//! Both passes visit machines in the slice order the caller provides.

use crate::event::{AutomationEvent, EventBus, Violation};
use crate::id::EntityId;
use crate::item::ItemCounts;
use crate::machine::{Machine, MachineState};
use crate::sim::Ticks;
use crate::storage::{JournalMark, StoragePool};
use tracing::{debug, error, trace, warn};

/// A machine borrowed for one network's processing.
#[derive(Debug)]
pub struct MachineSlot<'m> {
    pub id: EntityId,
    pub machine: &'m mut dyn Machine,
}

impl<'m> MachineSlot<'m> {
    pub fn new(id: EntityId, machine: &'m mut dyn Machine) -> Self {
        Self { id, machine }
    }
}

/// Tallies from processing one or more networks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Machines whose output was collected (fully or partly).
    pub outputs_collected: u32,
    pub items_collected: u64,
    /// Machines that accepted input.
    pub inputs_accepted: u32,
    pub contract_violations: u32,
    pub machine_failures: u32,
    pub container_failures: u32,
}

impl PassReport {
    pub fn merge(&mut self, other: PassReport) {
        self.outputs_collected += other.outputs_collected;
        self.items_collected += other.items_collected;
        self.inputs_accepted += other.inputs_accepted;
        self.contract_violations += other.contract_violations;
        self.machine_failures += other.machine_failures;
        self.container_failures += other.container_failures;
    }
}

/// Run both passes over one network, then report container failures.
pub fn process_network(
    machines: &mut [MachineSlot<'_>],
    pool: &mut StoragePool<'_>,
    events: &mut EventBus,
    tick: Ticks,
) -> PassReport {
    let mut report = collect_pass(machines, pool, events, tick);
    report.merge(feed_pass(machines, pool, events, tick));

    for (container, err) in pool.take_failures() {
        report.container_failures += 1;
        events.emit(AutomationEvent::ContainerFailed {
            container,
            reason: err.to_string(),
            tick,
        });
    }
    report
}

// ---------------------------------------------------------------------------
// Collect
// ---------------------------------------------------------------------------

pub fn collect_pass(
    machines: &mut [MachineSlot<'_>],
    pool: &mut StoragePool<'_>,
    events: &mut EventBus,
    tick: Ticks,
) -> PassReport {
    let mut report = PassReport::default();

    for slot in machines.iter_mut() {
        if slot.machine.get_state() != MachineState::Done {
            continue;
        }
        let Some(mut output) = slot.machine.get_output() else {
            continue;
        };
        let Some(sample) = output.stack().cloned() else {
            continue;
        };

        let mark = pool.journal_mark();
        let stored = sample.quantity - pool.insert(&sample);
        if stored == 0 {
            trace!(machine = ?slot.id, item = ?sample.kind(), "no room for output");
            continue;
        }

        match output.take(stored) {
            Ok(taken) => {
                let mut collected = taken.clone();
                if taken.quantity < stored {
                    // The machine handed over less than the pool already holds.
                    pool.rollback_to(mark);
                    let lost = pool.insert(&taken);
                    if lost > 0 {
                        error!(machine = ?slot.id, lost, "collected items no longer fit");
                    }
                } else if taken.quantity > stored {
                    report.contract_violations += 1;
                    warn!(
                        machine = ?slot.id,
                        requested = stored,
                        delivered = taken.quantity,
                        "machine handed over more output than was asked for"
                    );
                    events.emit(AutomationEvent::ContractViolation {
                        machine: slot.id,
                        violation: Violation::OverDelivered {
                            requested: stored,
                            delivered: taken.quantity,
                        },
                        tick,
                    });
                    collected.quantity = stored;
                    let surplus = taken.with_quantity(taken.quantity - stored);
                    if let Some(refused) = output.give_back(surplus) {
                        let lost = pool.insert(&refused);
                        collected.quantity += refused.quantity - lost;
                        if lost > 0 {
                            error!(machine = ?slot.id, lost, "surplus output fits nowhere");
                        }
                    }
                }
                pool.commit();
                report.outputs_collected += 1;
                report.items_collected += collected.quantity as u64;
                debug!(machine = ?slot.id, item = ?collected.kind(), quantity = collected.quantity, "output collected");
                events.emit(AutomationEvent::OutputCollected {
                    machine: slot.id,
                    items: collected,
                    tick,
                });
            }
            Err(err) => {
                pool.rollback_to(mark);
                pool.commit();
                report.machine_failures += 1;
                warn!(machine = ?slot.id, error = %err, "could not take machine output");
                events.emit(AutomationEvent::MachineFailed {
                    machine: slot.id,
                    reason: err.to_string(),
                    tick,
                });
            }
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub fn feed_pass(
    machines: &mut [MachineSlot<'_>],
    pool: &mut StoragePool<'_>,
    events: &mut EventBus,
    tick: Ticks,
) -> PassReport {
    let mut report = PassReport::default();

    for slot in machines.iter_mut() {
        if !pool.has_input() {
            trace!("pool has nothing left to offer");
            break;
        }

        let state = slot.machine.get_state();
        if state == MachineState::Disabled || !slot.machine.accepts_input(state) {
            continue;
        }

        let before = pool.fingerprint();
        let mark = pool.journal_mark();
        let result = slot.machine.set_input(pool);

        match result {
            Ok(true) => {
                if pool.fingerprint() == before {
                    report.contract_violations += 1;
                    warn!(
                        machine = ?slot.id,
                        machine_type = slot.machine.machine_type(),
                        "machine claimed input without consuming anything"
                    );
                    events.emit(AutomationEvent::ContractViolation {
                        machine: slot.id,
                        violation: Violation::ClaimedWithoutConsuming,
                        tick,
                    });
                } else {
                    report.inputs_accepted += 1;
                    debug!(machine = ?slot.id, "input accepted");
                    events.emit(AutomationEvent::InputAccepted {
                        machine: slot.id,
                        tick,
                    });
                }
            }
            Ok(false) => {
                if pool.changed_since(mark) || pool.fingerprint() != before {
                    revert(pool, mark, &before);
                    report.contract_violations += 1;
                    warn!(
                        machine = ?slot.id,
                        machine_type = slot.machine.machine_type(),
                        "machine declined input but changed the pool, reverted"
                    );
                    events.emit(AutomationEvent::ContractViolation {
                        machine: slot.id,
                        violation: Violation::DeclinedAfterConsuming,
                        tick,
                    });
                }
            }
            Err(err) => {
                revert(pool, mark, &before);
                report.machine_failures += 1;
                warn!(machine = ?slot.id, error = %err, "machine failed while taking input");
                events.emit(AutomationEvent::MachineFailed {
                    machine: slot.id,
                    reason: err.to_string(),
                    tick,
                });
            }
        }
        pool.commit();
    }

    report
}

/// Undo an adapter's changes since `mark`. Falls back to the content
/// fingerprint for changes the journal no longer covers.
fn revert(pool: &mut StoragePool<'_>, mark: JournalMark, before: &ItemCounts) {
    pool.rollback_to(mark);
    if pool.fingerprint() != *before && !pool.reconcile(before) {
        error!("pool contents could not be restored after a rejected input");
    }
}

//! The controlled scheduler.
//!
//! One [`Scheduler`] exists per controlled execution. It owns every
//! operation, decides which one runs next by consulting the decision
//! source, and polls exactly one body at a time. All bookkeeping sits behind
//! a single lock that is never held while a body runs; wakers are always
//! invoked after the lock is released.

mod operation;
mod waker;

pub(crate) use operation::{BoxBody, Outcome};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::clock::{TimerKey, VirtualClock};
use crate::config::{Config, UnfinishedPolicy};
use crate::decision::Recorder;
use crate::error::{Error, Fault, Result};
use crate::task::{OperationId, OperationInfo, OperationStatus};

use operation::Operation;
use waker::OperationWaker;

/// Predicate over a set of operations, evaluated on terminal states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WaitCondition {
    /// At least one operation is terminal.
    Any,
    /// Every operation is terminal.
    All,
}

/// What a single scheduling step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    /// The given operation was polled once.
    Ran(OperationId),
    /// Nothing was runnable.
    Idle,
}

pub(crate) struct Scheduler {
    state: Mutex<SchedulerState>,
    decisions: Arc<Mutex<Recorder>>,
    config: Config,
}

struct SchedulerState {
    operations: BTreeMap<OperationId, Operation>,
    next_id: u64,
    /// The operation currently being polled.
    active: Option<OperationId>,
    /// Number of operations that reached a terminal state so far.
    completions: u64,
    steps: usize,
    clock: VirtualClock,
}

impl SchedulerState {
    fn operation(&self, id: OperationId) -> Result<&Operation> {
        self.operations.get(&id).ok_or(Error::UnknownOperation(id))
    }

    fn operation_mut(&mut self, id: OperationId) -> Result<&mut Operation> {
        self.operations
            .get_mut(&id)
            .ok_or(Error::UnknownOperation(id))
    }

    fn allocate(&mut self, name: Option<String>) -> OperationInfo {
        let id = OperationId::new(self.next_id);
        self.next_id += 1;
        let info = OperationInfo::new(id);
        match name {
            Some(name) => info.with_name(name),
            None => info,
        }
    }

    fn unfinished(&self) -> Vec<OperationId> {
        self.operations
            .values()
            .filter(|op| !op.status().is_terminal())
            .map(Operation::id)
            .collect()
    }
}

impl Scheduler {
    pub(crate) fn new(config: Config, decisions: Arc<Mutex<Recorder>>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState {
                operations: BTreeMap::new(),
                next_id: 0,
                active: None,
                completions: 0,
                steps: 0,
                clock: VirtualClock::new(config.start_time),
            }),
            decisions,
            config,
        })
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers a new operation and makes it eligible to run.
    ///
    /// The caller keeps running; the body is first polled when the
    /// decision source picks it.
    pub(crate) fn register(&self, name: Option<String>, body: BoxBody) -> OperationId {
        let mut state = self.state.lock();
        let mut info = state.allocate(name);
        let id = info.id;
        // Created -> Scheduled is always legal for a fresh entry.
        info.status = OperationStatus::Scheduled;
        debug!(id = %id, name = ?info.name, "operation scheduled");
        state.operations.insert(id, Operation::new(info, Some(body)));
        id
    }

    /// Registers an operation that is terminal from the start.
    pub(crate) fn register_finished(&self, name: Option<String>, outcome: Outcome) -> OperationId {
        let mut state = self.state.lock();
        let mut info = state.allocate(name);
        let id = info.id;
        info.status = outcome.status();
        let seq = state.completions;
        state.completions += 1;
        let mut op = Operation::new(info, None);
        op.outcome = Some(outcome);
        op.completion_seq = Some(seq);
        trace!(id = %id, status = %op.status(), "operation created finished");
        state.operations.insert(id, op);
        id
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub(crate) fn active(&self) -> Option<OperationId> {
        self.state.lock().active
    }

    pub(crate) fn status(&self, id: OperationId) -> Result<OperationStatus> {
        Ok(self.state.lock().operation(id)?.status())
    }

    pub(crate) fn info(&self, id: OperationId) -> Option<OperationInfo> {
        self.state
            .lock()
            .operations
            .get(&id)
            .map(|op| op.info.clone())
    }

    pub(crate) fn infos(&self) -> Vec<OperationInfo> {
        self.state
            .lock()
            .operations
            .values()
            .map(|op| op.info.clone())
            .collect()
    }

    pub(crate) fn steps(&self) -> usize {
        self.state.lock().steps
    }

    pub(crate) fn now(&self) -> Duration {
        self.state.lock().clock.now()
    }

    /// Clones the result of a completed operation.
    pub(crate) fn result<T: Clone + 'static>(&self, id: OperationId) -> Result<T> {
        let state = self.state.lock();
        let op = state.operation(id)?;
        match &op.outcome {
            Some(Outcome::Completed(value)) => (**value)
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| Error::invalid_state(id, "a result of the requested type", op.status())),
            _ => Err(Error::invalid_state(id, "Completed", op.status())),
        }
    }

    /// Clones the fault of a faulted operation.
    pub(crate) fn fault(&self, id: OperationId) -> Result<Fault> {
        let state = self.state.lock();
        let op = state.operation(id)?;
        op.fault()
            .ok_or_else(|| Error::invalid_state(id, "Faulted", op.status()))
    }

    /// Returns the terminal outcome as seen by an awaiting operation.
    pub(crate) fn outcome<T: Clone + 'static>(
        &self,
        id: OperationId,
    ) -> Result<std::result::Result<T, Fault>> {
        match self.status(id)? {
            OperationStatus::Completed => self.result(id).map(Ok),
            OperationStatus::Faulted => self.fault(id).map(Err),
            other => Err(Error::invalid_state(id, "terminal", other)),
        }
    }

    /// Of the given operations, the one that became terminal first.
    pub(crate) fn first_terminal(&self, targets: &[OperationId]) -> Option<OperationId> {
        let state = self.state.lock();
        targets
            .iter()
            .filter_map(|id| state.operations.get(id))
            .filter_map(|op| op.completion_seq.map(|seq| (seq, op.id())))
            .min()
            .map(|(_, id)| id)
    }

    // ========================================================================
    // Waiting and notification
    // ========================================================================

    /// Evaluates `condition` over `targets`. If it does not hold yet, the
    /// calling operation is registered as a continuation of every target
    /// that is still running, and `false` is returned.
    pub(crate) fn watch(
        &self,
        targets: &[OperationId],
        condition: WaitCondition,
        waker: &Waker,
    ) -> Result<bool> {
        let mut state = self.state.lock();
        let mut terminal = 0;
        for id in targets {
            if state.operation(*id)?.status().is_terminal() {
                terminal += 1;
            }
        }
        let satisfied = match condition {
            WaitCondition::Any => terminal > 0,
            WaitCondition::All => terminal == targets.len(),
        };
        if satisfied {
            return Ok(true);
        }

        let waiter = state.active;
        for id in targets {
            let op = state.operation_mut(*id)?;
            if !op.status().is_terminal() {
                op.add_continuation(waiter, waker);
            }
        }
        trace!(waiter = ?waiter, targets = targets.len(), ?condition, "waiting");
        Ok(false)
    }

    /// Marks an operation runnable. Called through its waker.
    pub(crate) fn wake(&self, id: OperationId) {
        let mut state = self.state.lock();
        let Some(op) = state.operations.get_mut(&id) else {
            return;
        };
        match op.status() {
            OperationStatus::Blocked => {
                op.info.status = OperationStatus::Runnable;
                trace!(id = %id, "operation runnable");
            }
            OperationStatus::Running => op.woken = true,
            _ => {}
        }
    }

    /// Stores the terminal outcome and notifies every continuation.
    pub(crate) fn finish(&self, id: OperationId, outcome: Outcome) -> Result<()> {
        let continuations = {
            let mut state = self.state.lock();
            let seq = state.completions;
            let continuations = state.operation_mut(id)?.finish(outcome, seq)?;
            state.completions += 1;
            let status = state.operation(id)?.status();
            debug!(id = %id, %status, waiters = continuations.len(), "operation finished");
            continuations
        };
        for continuation in continuations {
            continuation.waker.wake();
        }
        Ok(())
    }

    // ========================================================================
    // Virtual time
    // ========================================================================

    pub(crate) fn register_timer(&self, after: Duration, waker: &Waker) -> TimerKey {
        self.state.lock().clock.register(after, waker)
    }

    pub(crate) fn update_timer(&self, key: TimerKey, waker: &Waker) {
        self.state.lock().clock.update_waker(key, waker);
    }

    pub(crate) fn timer_fired(&self, key: TimerKey) -> bool {
        self.state.lock().clock.has_fired(key)
    }

    pub(crate) fn cancel_timer(&self, key: TimerKey) {
        self.state.lock().clock.cancel(key);
    }

    /// Fires the earliest pending timers. Returns false if none was pending.
    fn fire_timers(&self) -> bool {
        let wakers = self.state.lock().clock.fire_next();
        let fired = !wakers.is_empty();
        for waker in wakers {
            waker.wake();
        }
        fired
    }

    // ========================================================================
    // Nondeterministic values
    // ========================================================================

    pub(crate) fn choose_bool(&self) -> bool {
        self.decisions.lock().choose_bool()
    }

    pub(crate) fn choose_int(&self, max: usize) -> Result<usize> {
        self.decisions.lock().choose_int(max)
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Runs one scheduling point: picks a runnable operation and polls it once.
    pub(crate) fn step(self: &Arc<Self>) -> Result<Step> {
        let runnable: Vec<OperationId> = {
            let state = self.state.lock();
            if state.steps >= self.config.max_steps {
                warn!(steps = state.steps, "step limit exceeded");
                return Err(Error::StepLimitExceeded(self.config.max_steps));
            }
            state
                .operations
                .values()
                .filter(|op| op.status().is_runnable())
                .map(Operation::id)
                .collect()
        };

        let chosen = match runnable.as_slice() {
            [] => return Ok(Step::Idle),
            [only] => *only,
            _ => self.decisions.lock().choose(&runnable)?,
        };

        let (mut body, waker) = {
            let mut state = self.state.lock();
            state.steps += 1;
            let op = state.operation_mut(chosen)?;
            if op.body.is_none() {
                return Err(Error::invalid_state(chosen, "a pending body", op.status()));
            }
            op.info.transition(OperationStatus::Running)?;
            op.info.poll_count += 1;
            op.woken = false;
            let body = op.body.take();
            let waker = op
                .waker
                .get_or_insert_with(|| OperationWaker::waker(self, chosen))
                .clone();
            state.active = Some(chosen);
            body.map(|body| (body, waker))
        }
        .ok_or(Error::UnknownOperation(chosen))?;

        trace!(id = %chosen, "polling operation");
        let mut cx = Context::from_waker(&waker);
        match body.as_mut().poll(&mut cx) {
            Poll::Ready(outcome) => {
                self.state.lock().active = None;
                self.finish(chosen, outcome)?;
            }
            Poll::Pending => {
                let mut state = self.state.lock();
                state.active = None;
                let op = state.operation_mut(chosen)?;
                op.body = Some(body);
                let next = if std::mem::take(&mut op.woken) {
                    OperationStatus::Runnable
                } else {
                    OperationStatus::Blocked
                };
                op.info.transition(next)?;
                trace!(id = %chosen, status = %next, "operation suspended");
            }
        }
        Ok(Step::Ran(chosen))
    }

    /// Drives the execution until `entry` is terminal, then keeps running
    /// whatever is still runnable so that every operation gets to finish.
    pub(crate) fn run(self: &Arc<Self>, entry: OperationId) -> Result<()> {
        while !self.status(entry)?.is_terminal() {
            if self.step()? == Step::Idle && !self.fire_timers() {
                let blocked = self.state.lock().unfinished();
                warn!(blocked = blocked.len(), "deadlock detected");
                return Err(Error::Deadlock { blocked });
            }
        }

        debug!(entry = %entry, "entry operation finished, draining");
        loop {
            if self.step()? == Step::Idle && !self.fire_timers() {
                break;
            }
        }

        let unfinished = self.state.lock().unfinished();
        if unfinished.is_empty() {
            return Ok(());
        }
        match self.config.unfinished {
            UnfinishedPolicy::Fail => {
                warn!(unfinished = unfinished.len(), "operations never finished");
                Err(Error::Deadlock {
                    blocked: unfinished,
                })
            }
            UnfinishedPolicy::Ignore => {
                warn!(
                    unfinished = unfinished.len(),
                    "ignoring operations that never finished"
                );
                Ok(())
            }
        }
    }

    /// Drops every body and pending waiter, keeping outcomes observable.
    ///
    /// Bodies hold contexts that point back at the scheduler, so this also
    /// breaks those reference cycles.
    pub(crate) fn teardown(&self) {
        let (bodies, continuations): (Vec<_>, Vec<_>) = {
            let mut state = self.state.lock();
            state.active = None;
            state.clock.clear();
            state
                .operations
                .values_mut()
                .map(|op| (op.body.take(), std::mem::take(&mut op.continuations)))
                .unzip()
        };
        drop(bodies);
        drop(continuations);
    }

    /// Drops every stored outcome.
    ///
    /// A result may itself be a handle into this scheduler (the winner
    /// returned by `when_any`), so outcomes are released once the execution
    /// is no longer observed.
    pub(crate) fn release(&self) {
        let outcomes: Vec<_> = {
            let mut state = self.state.lock();
            state
                .operations
                .values_mut()
                .filter_map(|op| op.outcome.take())
                .collect()
        };
        drop(outcomes);
    }
}

// Copyright 2023 Bitwise IO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resolution of enlistments left in doubt when the coordinator went away.
//!
//! When the coordinator becomes unreachable, prepared and committing enlistments are tracked
//! here. A background worker periodically asks the coordinator (through an [`OutcomeQuery`])
//! how each in-doubt transaction ended and delivers the outcome to the resource. Once nothing is
//! left to resolve it reports recovery complete and exits; the next tracked enlistment starts a
//! new worker.
//!
//! Lock order: the coordinator's lock is always taken before any enlistment's lock.

mod builder;
mod query;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use uuid::Uuid;

use crate::enlistment::{DurableEnlistment, EnlistmentId, EnlistmentState};
use crate::error::InternalError;
use crate::registry::EnlistmentRegistry;

pub use builder::ReenlistmentCoordinatorBuilder;
pub use query::{OutcomeQuery, TransactionOutcome};

const WORKER_NAME: &str = "pledge-reenlist";

/// The enlistments waiting for an outcome, and the state of the worker resolving them.
#[derive(Default)]
pub(crate) struct ReenlistLists {
    in_doubt: HashMap<Uuid, HashSet<EnlistmentId>>,
    pending_removal: HashSet<EnlistmentId>,
    worker: Option<JoinHandle<()>>,
    running: bool,
    shutdown: bool,
}

impl ReenlistLists {
    pub(crate) fn track_in_doubt(&mut self, transaction_id: Uuid, id: EnlistmentId) {
        self.in_doubt.entry(transaction_id).or_default().insert(id);
    }

    /// Tracks an enlistment whose commit was delivered but not acknowledged yet.
    pub(crate) fn track_pending_removal(&mut self, id: EnlistmentId) {
        self.pending_removal.insert(id);
    }

    fn remove_in_doubt(&mut self, id: EnlistmentId) {
        self.in_doubt.retain(|_, ids| {
            ids.remove(&id);
            !ids.is_empty()
        });
    }

    fn forget(&mut self, id: EnlistmentId) {
        self.remove_in_doubt(id);
        self.pending_removal.remove(&id);
    }

    fn in_doubt_count(&self) -> usize {
        self.in_doubt.values().map(HashSet::len).sum()
    }

    fn is_empty(&self) -> bool {
        self.in_doubt.is_empty() && self.pending_removal.is_empty()
    }
}

struct Shared {
    lists: Mutex<ReenlistLists>,
    wakeup: Condvar,
    registry: Arc<dyn EnlistmentRegistry>,
    outcome_query: Arc<dyn OutcomeQuery>,
    poll_interval: Duration,
}

/// Tracks in-doubt enlistments and runs the worker that resolves them.
///
/// Every registered enlistment holds the coordinator, and the coordinator holds the registry, so
/// dropping the last outside handle does not stop the worker while an enlistment is still
/// registered. Call [`shutdown`](Self::shutdown) to stop it.
pub struct ReenlistmentCoordinator {
    shared: Arc<Shared>,
}

impl ReenlistmentCoordinator {
    fn new(
        registry: Arc<dyn EnlistmentRegistry>,
        outcome_query: Arc<dyn OutcomeQuery>,
        poll_interval: Duration,
    ) -> Self {
        ReenlistmentCoordinator {
            shared: Arc::new(Shared {
                lists: Mutex::new(ReenlistLists::default()),
                wakeup: Condvar::new(),
                registry,
                outcome_query,
                poll_interval,
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// Runs `update` under the coordinator's lock and starts the worker if anything is left to
    /// resolve.
    ///
    /// `update` may take an enlistment's lock; no enlistment lock may be held by the caller.
    ///
    /// # Errors
    ///
    /// Returns an `InternalError`, without running `update`, once the coordinator is shut down,
    /// and when the worker can not be started.
    pub(crate) fn track<R>(
        &self,
        update: impl FnOnce(&mut ReenlistLists) -> R,
    ) -> Result<R, InternalError> {
        let mut lists = self.shared.lists.lock();
        if lists.shutdown {
            return Err(InternalError::with_message::<String>(
                "reenlistment coordinator is shut down".into(),
            ));
        }
        let result = update(&mut lists);

        if !lists.is_empty() && !lists.running {
            let shared = Arc::clone(&self.shared);
            let worker = thread::Builder::new()
                .name(WORKER_NAME.into())
                .spawn(move || shared.run())
                .map_err(|err| {
                    error!("unable to start the reenlistment worker: {}", err);
                    InternalError::from_source(Box::new(err))
                })?;
            lists.running = true;
            // A previous worker has already left its loop; its handle is not needed.
            lists.worker = Some(worker);
        }

        Ok(result)
    }

    pub(crate) fn track_in_doubt(
        &self,
        transaction_id: Uuid,
        id: EnlistmentId,
    ) -> Result<(), InternalError> {
        self.track(|lists| lists.track_in_doubt(transaction_id, id))
    }

    /// Stops tracking an enlistment. Unknown ids are ignored.
    pub(crate) fn forget(&self, id: EnlistmentId) {
        self.shared.lists.lock().forget(id);
    }

    pub fn is_running(&self) -> bool {
        self.shared.lists.lock().running
    }

    pub fn in_doubt_count(&self) -> usize {
        self.shared.lists.lock().in_doubt_count()
    }

    pub fn pending_removal_count(&self) -> usize {
        self.shared.lists.lock().pending_removal.len()
    }

    /// Stops the worker and waits for it to exit. Nothing can be tracked afterwards.
    pub fn shutdown(&self) {
        let worker = {
            let mut lists = self.shared.lists.lock();
            lists.shutdown = true;
            lists.worker.take()
        };
        self.shared.wakeup.notify_all();

        if let Some(worker) = worker {
            // The worker may drop the last handle to this coordinator itself.
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                error!("reenlistment worker panicked");
            }
        }
    }
}

impl Drop for ReenlistmentCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn run(self: Arc<Self>) {
        info!("reenlistment worker started");
        loop {
            self.resolve();

            let mut lists = self.lists.lock();
            if !lists.shutdown && !lists.is_empty() {
                self.wakeup.wait_for(&mut lists, self.poll_interval);
            }
            if lists.shutdown {
                lists.running = false;
                info!("reenlistment worker stopped");
                return;
            }
            if lists.is_empty() {
                lists.running = false;
                break;
            }
        }

        if let Err(err) = self.outcome_query.recovery_complete() {
            warn!("unable to report recovery complete: {}", err);
        }
        info!("reenlistment complete, worker stopped");
    }

    /// Makes one attempt to resolve every tracked enlistment.
    fn resolve(&self) {
        let (in_doubt, pending_removal) = {
            let lists = self.lists.lock();
            (
                lists
                    .in_doubt
                    .values()
                    .flat_map(|ids| ids.iter().copied())
                    .collect::<Vec<_>>(),
                lists.pending_removal.iter().copied().collect::<Vec<_>>(),
            )
        };

        for id in pending_removal {
            if self.live_enlistment(id).is_none() {
                self.lists.lock().forget(id);
            }
        }

        for id in in_doubt {
            let enlistment = match self.live_enlistment(id) {
                Some(enlistment) => enlistment,
                None => {
                    self.lists.lock().forget(id);
                    continue;
                }
            };

            match enlistment.state() {
                EnlistmentState::Prepared => self.query(&enlistment),
                // Waits for the resource to acknowledge; release forgets it.
                EnlistmentState::Committing => (),
                state => {
                    debug!("enlistment {}: no longer in doubt in state {}", id, state);
                    self.lists.lock().remove_in_doubt(id);
                }
            }
        }
    }

    fn query(&self, enlistment: &Arc<DurableEnlistment>) {
        let id = enlistment.id();
        let token = match enlistment.recovery_token() {
            Some(token) => token,
            None => {
                warn!("enlistment {}: prepared without a coordinator token", id);
                return;
            }
        };

        match self.outcome_query.query_outcome(&token) {
            Ok(TransactionOutcome::Committed) => self.apply(enlistment, true),
            Ok(TransactionOutcome::Aborted) => self.apply(enlistment, false),
            Ok(TransactionOutcome::Unknown) => debug!(
                "enlistment {}: outcome of transaction {} not known yet",
                id,
                enlistment.transaction_id()
            ),
            Err(err) if err.is_unavailable() => {
                debug!("enlistment {}: coordinator still unreachable: {}", id, err)
            }
            Err(err) => warn!("enlistment {}: outcome query failed: {}", id, err),
        }
    }

    fn apply(&self, enlistment: &Arc<DurableEnlistment>, committed: bool) {
        let delivery = {
            let mut lists = self.lists.lock();
            let delivery = enlistment.begin_outcome(committed);
            if delivery.is_some() {
                lists.remove_in_doubt(enlistment.id());
                if committed {
                    lists.track_pending_removal(enlistment.id());
                }
            }
            delivery
        };

        if let Some(delivery) = delivery {
            delivery.deliver();
        }
    }

    fn live_enlistment(&self, id: EnlistmentId) -> Option<Arc<DurableEnlistment>> {
        self.registry
            .lookup(id)
            .filter(|enlistment| !enlistment.is_released())
    }
}

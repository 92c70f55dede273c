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

//! Recording doubles for the coordinator, the resource and the outcome query.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::enlistment::{
    CoordinatorChannel, DurableEnlistment, EnlistmentId, EnlistmentNotification,
};
use crate::error::ChannelError;
use crate::recovery::RecoveryToken;
use crate::reenlistment::{
    OutcomeQuery, ReenlistmentCoordinator, ReenlistmentCoordinatorBuilder, TransactionOutcome,
};
use crate::registry::{EnlistmentRegistry, EnlistmentTable};
use crate::resource_manager::{EnlistmentOptions, ResourceManager, ResourceManagerBuilder};
use crate::transaction::Transaction;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelCall {
    VoteReadOnly,
    VotePrepared,
    VoteFailed,
    VoteSinglePhase,
    VoteInDoubt,
    AcknowledgeCommit,
    AcknowledgeAbort,
    Phase0Vote(bool),
    Unenlist,
}

pub struct RecordingChannel {
    calls: Mutex<Vec<ChannelCall>>,
    failure: Option<fn() -> ChannelError>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingChannel {
            calls: Mutex::new(Vec::new()),
            failure: None,
        })
    }

    /// A channel whose every call is recorded and then fails.
    pub fn failing(failure: fn() -> ChannelError) -> Arc<Self> {
        Arc::new(RecordingChannel {
            calls: Mutex::new(Vec::new()),
            failure: Some(failure),
        })
    }

    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: ChannelCall) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: ChannelCall) -> Result<(), ChannelError> {
        self.calls.lock().push(call);
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }
}

impl CoordinatorChannel for RecordingChannel {
    fn vote_read_only(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::VoteReadOnly)
    }

    fn vote_prepared(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::VotePrepared)
    }

    fn vote_failed(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::VoteFailed)
    }

    fn vote_single_phase(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::VoteSinglePhase)
    }

    fn vote_in_doubt(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::VoteInDoubt)
    }

    fn acknowledge_commit(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::AcknowledgeCommit)
    }

    fn acknowledge_abort(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::AcknowledgeAbort)
    }

    fn phase0_vote(&self, vote: bool) -> Result<(), ChannelError> {
        self.record(ChannelCall::Phase0Vote(vote))
    }

    fn unenlist(&self) -> Result<(), ChannelError> {
        self.record(ChannelCall::Unenlist)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceCall {
    Prepare,
    Commit,
    Rollback,
    SinglePhaseCommit,
}

/// A resource that records its notifications and optionally answers them from inside the
/// callback.
pub struct RecordingResource {
    calls: Mutex<Vec<ResourceCall>>,
    auto_reply: bool,
}

impl RecordingResource {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingResource {
            calls: Mutex::new(Vec::new()),
            auto_reply: false,
        })
    }

    /// Answers prepare with `prepared`, commit and rollback with `enlistment_done`, and single
    /// phase commit with `committed`.
    pub fn with_auto_reply() -> Arc<Self> {
        Arc::new(RecordingResource {
            calls: Mutex::new(Vec::new()),
            auto_reply: true,
        })
    }

    pub fn calls(&self) -> Vec<ResourceCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: ResourceCall) -> usize {
        self.calls.lock().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: ResourceCall) {
        self.calls.lock().push(call);
    }
}

impl EnlistmentNotification for RecordingResource {
    fn prepare(&self, enlistment: Arc<DurableEnlistment>) {
        self.record(ResourceCall::Prepare);
        if self.auto_reply {
            enlistment.prepared().unwrap();
        }
    }

    fn commit(&self, enlistment: Arc<DurableEnlistment>) {
        self.record(ResourceCall::Commit);
        if self.auto_reply {
            enlistment.enlistment_done().unwrap();
        }
    }

    fn rollback(&self, enlistment: Arc<DurableEnlistment>) {
        self.record(ResourceCall::Rollback);
        if self.auto_reply {
            enlistment.enlistment_done().unwrap();
        }
    }

    fn single_phase_commit(&self, enlistment: Arc<DurableEnlistment>) {
        self.record(ResourceCall::SinglePhaseCommit);
        if self.auto_reply {
            enlistment.committed().unwrap();
        }
    }
}

/// An outcome query returning a configurable answer.
pub struct ScriptedQuery {
    outcome: Mutex<TransactionOutcome>,
    last_token: Mutex<Option<RecoveryToken>>,
    queries: AtomicUsize,
    completions: AtomicUsize,
}

impl ScriptedQuery {
    pub fn new() -> Self {
        ScriptedQuery {
            outcome: Mutex::new(TransactionOutcome::Unknown),
            last_token: Mutex::new(None),
            queries: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: TransactionOutcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn last_token(&self) -> Option<RecoveryToken> {
        self.last_token.lock().clone()
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

impl OutcomeQuery for ScriptedQuery {
    fn query_outcome(&self, token: &RecoveryToken) -> Result<TransactionOutcome, ChannelError> {
        *self.last_token.lock() = Some(token.clone());
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(*self.outcome.lock())
    }

    fn recovery_complete(&self) -> Result<(), ChannelError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// An [`EnlistmentTable`] that also counts deregistrations.
#[derive(Default)]
pub struct RecordingRegistry {
    table: EnlistmentTable,
    deregistrations: Mutex<Vec<EnlistmentId>>,
}

impl RecordingRegistry {
    pub fn deregistrations(&self, id: EnlistmentId) -> usize {
        self.deregistrations
            .lock()
            .iter()
            .filter(|deregistered| **deregistered == id)
            .count()
    }
}

impl EnlistmentRegistry for RecordingRegistry {
    fn register(&self, enlistment: Arc<DurableEnlistment>) {
        self.table.register(enlistment)
    }

    fn deregister(&self, id: EnlistmentId) {
        self.deregistrations.lock().push(id);
        self.table.deregister(id)
    }

    fn lookup(&self, id: EnlistmentId) -> Option<Arc<DurableEnlistment>> {
        self.table.lookup(id)
    }

    fn enlistments(&self) -> Vec<Arc<DurableEnlistment>> {
        self.table.enlistments()
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}

pub struct Fixture {
    pub manager: ResourceManager,
    pub registry: Arc<RecordingRegistry>,
    pub reenlistment: Arc<ReenlistmentCoordinator>,
    pub query: Arc<ScriptedQuery>,
}

impl Fixture {
    pub fn enlist(
        &self,
        transaction: &Arc<Transaction>,
        resource: &Arc<RecordingResource>,
        options: EnlistmentOptions,
    ) -> Arc<DurableEnlistment> {
        self.manager
            .enlist_durable(transaction, resource.clone(), options)
            .unwrap()
    }
}

/// A resource manager wired to an in-memory registry and a fast polling reenlistment worker.
pub fn fixture() -> Fixture {
    let registry = Arc::new(RecordingRegistry::default());
    let query = Arc::new(ScriptedQuery::new());
    let reenlistment = Arc::new(
        ReenlistmentCoordinatorBuilder::new()
            .with_registry(registry.clone())
            .with_outcome_query(query.clone())
            .with_poll_interval(Duration::from_millis(5))
            .build()
            .unwrap(),
    );
    let manager = ResourceManagerBuilder::new()
        .with_id(Uuid::new_v4())
        .with_node_identity("test-node".into())
        .with_registry(registry.clone())
        .with_reenlistment(Arc::clone(&reenlistment))
        .build()
        .unwrap();

    Fixture {
        manager,
        registry,
        reenlistment,
        query,
    }
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

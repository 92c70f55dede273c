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

use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{ChannelError, EnlistmentError};
use crate::recovery::{self, RecoveryToken};
use crate::transaction::Transaction;

use super::{
    Channel, CoordinatorChannel, EnlistmentId, EnlistmentNotification, EnlistmentServices,
    EnlistmentState,
};

struct EnlistmentInner {
    state: EnlistmentState,
    channel: Channel,
    // Cleared on release; the resource usually holds the enlistment as well.
    notification: Option<Arc<dyn EnlistmentNotification>>,
    single_phase_capable: bool,
    is_single_phase: bool,
    phase0_enlisted: bool,
    phase0_vote_counted: bool,
    aborting_hint: bool,
    phase0_no_vote_deferred: bool,
    fabricate_rollback: bool,
    // The coordinator aborted while a phase 1 prepare was outstanding.
    prepare_abandoned: bool,
    coordinator_unavailable: bool,
    released: bool,
}

impl EnlistmentInner {
    fn new(
        state: EnlistmentState,
        notification: Arc<dyn EnlistmentNotification>,
        single_phase_capable: bool,
        phase0_enlisted: bool,
    ) -> Self {
        EnlistmentInner {
            state,
            channel: Channel::Detached,
            notification: Some(notification),
            single_phase_capable,
            is_single_phase: false,
            phase0_enlisted,
            phase0_vote_counted: false,
            aborting_hint: false,
            phase0_no_vote_deferred: false,
            fabricate_rollback: false,
            prepare_abandoned: false,
            coordinator_unavailable: false,
            released: false,
        }
    }

    /// Returns true the first time a phase 0 vote is cast for a phase 0 enlistment.
    fn count_phase0_vote(&mut self) -> bool {
        if self.phase0_enlisted && !self.phase0_vote_counted {
            self.phase0_vote_counted = true;
            true
        } else {
            false
        }
    }
}

/// The participant for one resource in one distributed transaction.
///
/// All operations are thread-safe. The internal lock is held only while the state is inspected or
/// changed and never while calling the coordinator channel, the resource, the registry or the
/// reenlistment coordinator, so a resource may answer a notification from inside the callback.
pub struct DurableEnlistment {
    id: EnlistmentId,
    transaction_id: Uuid,
    transaction: Option<Arc<Transaction>>,
    services: EnlistmentServices,
    coordinator_token: OnceLock<Vec<u8>>,
    recovery_information: OnceLock<Vec<u8>>,
    inner: Mutex<EnlistmentInner>,
}

impl DurableEnlistment {
    pub(crate) fn new(
        id: EnlistmentId,
        transaction: Arc<Transaction>,
        notification: Arc<dyn EnlistmentNotification>,
        single_phase_capable: bool,
        phase0_enlisted: bool,
        services: EnlistmentServices,
    ) -> Self {
        DurableEnlistment {
            id,
            transaction_id: *transaction.id(),
            transaction: Some(transaction),
            services,
            coordinator_token: OnceLock::new(),
            recovery_information: OnceLock::new(),
            inner: Mutex::new(EnlistmentInner::new(
                EnlistmentState::Active,
                notification,
                single_phase_capable,
                phase0_enlisted,
            )),
        }
    }

    /// Rebuilds a prepared enlistment from a recovery blob after a restart. Recovered
    /// enlistments have no transaction handle.
    pub(crate) fn recovered(
        id: EnlistmentId,
        token: RecoveryToken,
        recovery_information: Vec<u8>,
        notification: Arc<dyn EnlistmentNotification>,
        services: EnlistmentServices,
    ) -> Self {
        DurableEnlistment {
            id,
            transaction_id: token.transaction_id,
            transaction: None,
            services,
            coordinator_token: OnceLock::from(token.coordinator_token),
            recovery_information: OnceLock::from(recovery_information),
            inner: Mutex::new(EnlistmentInner::new(
                EnlistmentState::Prepared,
                notification,
                false,
                false,
            )),
        }
    }

    pub fn id(&self) -> EnlistmentId {
        self.id
    }

    pub fn transaction_id(&self) -> &Uuid {
        &self.transaction_id
    }

    pub fn resource_manager_id(&self) -> &Uuid {
        &self.services.resource_manager_id
    }

    /// The parent transaction; `None` for an enlistment rebuilt by recovery.
    pub fn transaction(&self) -> Option<&Arc<Transaction>> {
        self.transaction.as_ref()
    }

    pub fn state(&self) -> EnlistmentState {
        self.inner.lock().state
    }

    pub fn is_single_phase(&self) -> bool {
        self.inner.lock().is_single_phase
    }

    /// The prepare information supplied by the coordinator, or synthesized during phase 0.
    pub fn coordinator_token(&self) -> Option<&[u8]> {
        self.coordinator_token.get().map(Vec::as_slice)
    }

    /// True once the enlistment reached its end and was removed from the registry.
    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// Returns the recovery blob the resource must persist before voting prepared.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolStateViolation` if no prepare request has produced the blob yet.
    pub fn recovery_information(&self) -> Result<Vec<u8>, EnlistmentError> {
        self.recovery_information.get().cloned().ok_or_else(|| {
            EnlistmentError::state_violation(format!(
                "enlistment {} has no recovery information before prepare",
                self.id
            ))
        })
    }

    /// The token the coordinator is queried with during reenlistment. A recovered enlistment
    /// keeps the node identity it was created under.
    pub(crate) fn recovery_token(&self) -> Option<RecoveryToken> {
        if let Some(token) = self
            .recovery_information
            .get()
            .and_then(|blob| recovery::decode(blob).ok())
        {
            return Some(token);
        }
        self.coordinator_token.get().map(|coordinator_token| {
            RecoveryToken::new(
                self.transaction_id,
                self.services.resource_manager_id,
                self.services.node_identity.clone(),
                coordinator_token.clone(),
            )
        })
    }

    /// Attaches the channel phase 1 votes and acknowledgements are sent through.
    pub fn attach_phase1_channel(&self, channel: Arc<dyn CoordinatorChannel>) {
        self.inner.lock().channel = Channel::Phase1(channel);
    }

    /// Attaches the channel phase 0 votes are sent through.
    ///
    /// Ignored while a phase 1 channel is attached. If a phase 0 request already decided to vote
    /// no, the vote is cast on the new channel immediately.
    pub fn attach_phase0_channel(
        &self,
        channel: Arc<dyn CoordinatorChannel>,
    ) -> Result<(), EnlistmentError> {
        let vote_no = {
            let mut inner = self.inner.lock();
            if inner.channel.is_phase1() {
                debug!(
                    "enlistment {}: phase 0 channel ignored, phase 1 channel attached",
                    self.id
                );
                return Ok(());
            }
            inner.channel = Channel::Phase0(Arc::clone(&channel));
            let vote_no = inner.phase0_no_vote_deferred
                || (inner.state == EnlistmentState::Active
                    && (inner.aborting_hint || inner.coordinator_unavailable));
            inner.phase0_no_vote_deferred = false;
            vote_no
        };

        if vote_no {
            self.swallow_all(channel.phase0_vote(false), "deferred phase 0 no vote");
        }
        Ok(())
    }

    /// Handles a phase 1 prepare (or single phase commit) request from the coordinator.
    ///
    /// Returns `true` if a terminal vote was produced and `false` if the request was forwarded to
    /// the resource or answered with a prepared vote. A request arriving while another notification
    /// is outstanding, or after the enlistment started aborting, is answered with a failed vote.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolStateViolation` for a repeated phase 1 prepare request.
    pub fn prepare_request(
        self: &Arc<Self>,
        single_phase_allowed: bool,
        coordinator_token: Vec<u8>,
    ) -> Result<bool, EnlistmentError> {
        let (previous, state, channel, notification) = {
            let mut inner = self.inner.lock();
            let previous = inner.state;
            if previous == EnlistmentState::Preparing {
                return Err(EnlistmentError::state_violation(format!(
                    "enlistment {} received a prepare request while in state {}",
                    self.id, previous
                )));
            }

            if previous == EnlistmentState::Active {
                if single_phase_allowed && inner.single_phase_capable {
                    inner.is_single_phase = true;
                    inner.state = EnlistmentState::SinglePhaseCommitting;
                    self.publish_coordinator_token(coordinator_token);
                } else {
                    inner.state = EnlistmentState::Preparing;
                    self.publish_prepare_information(coordinator_token);
                }
            }

            (
                previous,
                inner.state,
                inner.channel.phase1(),
                inner.notification.clone(),
            )
        };

        if let Some(transaction) = &self.transaction {
            transaction.mark_too_late_for_enlistments();
        }

        match state {
            EnlistmentState::SinglePhaseCommitting => {
                if let Some(notification) = notification {
                    debug!("enlistment {}: single phase commit", self.id);
                    notification.single_phase_commit(Arc::clone(self));
                }
                Ok(true)
            }
            EnlistmentState::Preparing => {
                if let Some(notification) = notification {
                    debug!("enlistment {}: prepare", self.id);
                    notification.prepare(Arc::clone(self));
                }
                Ok(false)
            }
            EnlistmentState::Prepared => {
                if let Some(channel) = channel {
                    self.swallow_unavailable(channel.vote_prepared(), "prepared vote")?;
                }
                Ok(false)
            }
            EnlistmentState::Done => {
                let result = match channel {
                    Some(channel) => {
                        self.swallow_unavailable(channel.vote_read_only(), "read-only vote")
                    }
                    None => Ok(()),
                };
                self.release();
                result.map(|_| true)
            }
            _ => {
                debug!(
                    "enlistment {}: prepare request in state {} answered with a failed vote",
                    self.id, previous
                );
                if let Some(channel) = channel {
                    self.swallow_all(channel.vote_failed(), "failed vote");
                }
                Ok(true)
            }
        }
    }

    /// Handles a phase 0 request from the coordinator.
    ///
    /// `aborting_hint` tells the enlistment the transaction is already known to abort, in which
    /// case the resource is never contacted.
    pub fn phase0_request(self: &Arc<Self>, aborting_hint: bool) -> Result<(), EnlistmentError> {
        let commit_not_yet_called = self
            .transaction
            .as_ref()
            .map(|transaction| transaction.commit_not_yet_called())
            .unwrap_or(false);

        let (vote_no, counted, notification) = {
            let mut inner = self.inner.lock();
            inner.aborting_hint = aborting_hint;
            if inner.state != EnlistmentState::Active {
                debug!(
                    "enlistment {}: phase 0 request ignored in state {}",
                    self.id, inner.state
                );
                return Ok(());
            }

            if aborting_hint || commit_not_yet_called || inner.coordinator_unavailable {
                let counted = inner.count_phase0_vote();
                let channel = inner.channel.phase0();
                if channel.is_none() {
                    inner.phase0_no_vote_deferred = true;
                }
                (channel, counted, None)
            } else {
                inner.state = EnlistmentState::Phase0Preparing;
                self.publish_prepare_information(recovery::phase0_token(
                    &self.transaction_id,
                    &self.services.resource_manager_id,
                ));
                (None, false, inner.notification.clone())
            }
        };

        if counted {
            self.decrement_undecided();
        }
        if let Some(channel) = vote_no {
            self.swallow_all(channel.phase0_vote(false), "phase 0 no vote");
        }
        if let Some(notification) = notification {
            debug!("enlistment {}: phase 0 prepare", self.id);
            notification.prepare(Arc::clone(self));
        }
        Ok(())
    }

    /// Handles a commit request from the coordinator.
    pub fn commit_request(self: &Arc<Self>) -> Result<(), EnlistmentError> {
        let (notification, channel) = {
            let mut inner = self.inner.lock();
            match inner.state {
                EnlistmentState::Prepared => {
                    inner.state = EnlistmentState::Committing;
                    (inner.notification.clone(), None)
                }
                state if state.is_terminal() => (None, Some(inner.channel.phase1())),
                state => {
                    return Err(EnlistmentError::state_violation(format!(
                        "enlistment {} received a commit request while in state {}",
                        self.id, state
                    )))
                }
            }
        };

        if let Some(notification) = notification {
            debug!("enlistment {}: commit", self.id);
            notification.commit(Arc::clone(self));
            return Ok(());
        }

        let result = match channel.flatten() {
            Some(channel) => {
                self.swallow_unavailable(channel.acknowledge_commit(), "commit acknowledgement")
            }
            None => Ok(()),
        };
        self.release();
        result
    }

    /// Handles an abort request from the coordinator.
    ///
    /// An abort arriving while a phase 1 prepare is outstanding ends the enlistment `Aborted`; the
    /// resource's later answer to that prepare is ignored.
    pub fn abort_request(self: &Arc<Self>) -> Result<(), EnlistmentError> {
        let (notification, channel) = {
            let mut inner = self.inner.lock();
            match inner.state {
                EnlistmentState::Active | EnlistmentState::Prepared => {
                    inner.state = EnlistmentState::Aborting;
                    (inner.notification.clone(), None)
                }
                EnlistmentState::Phase0Preparing => {
                    // Delivered once the resource answers the outstanding prepare.
                    inner.fabricate_rollback = true;
                    return Ok(());
                }
                EnlistmentState::Preparing => {
                    inner.state = EnlistmentState::Aborted;
                    inner.prepare_abandoned = true;
                    (None, Some(inner.channel.phase1()))
                }
                _ => (None, Some(inner.channel.phase1())),
            }
        };

        if let Some(notification) = notification {
            debug!("enlistment {}: rollback", self.id);
            notification.rollback(Arc::clone(self));
            return Ok(());
        }

        let result = match channel.flatten() {
            Some(channel) => {
                self.swallow_unavailable(channel.acknowledge_abort(), "abort acknowledgement")
            }
            None => Ok(()),
        };
        self.release();
        result
    }

    /// Records that the coordinator went away.
    ///
    /// Prepared and committing enlistments are handed to the reenlistment coordinator so their
    /// outcome can be resolved once the coordinator is reachable again. The resource is not told.
    pub fn coordinator_unavailable(&self) -> Result<(), EnlistmentError> {
        self.services.reenlistment.track(|lists| {
            let mut inner = self.inner.lock();
            inner.coordinator_unavailable = true;
            if !inner.released
                && matches!(
                    inner.state,
                    EnlistmentState::Prepared | EnlistmentState::Committing
                )
            {
                lists.track_in_doubt(self.transaction_id, self.id);
            }
        })?;
        Ok(())
    }

    /// The resource answers a prepare notification: its work is durable and it votes yes.
    pub fn prepared(self: &Arc<Self>) -> Result<(), EnlistmentError> {
        let doomed = self
            .transaction
            .as_ref()
            .map(|transaction| transaction.is_doomed())
            .unwrap_or(false);

        let (vote, counted, fabricate) = {
            let mut inner = self.inner.lock();
            if self.answer_ignored(&inner, "prepared") {
                return Ok(());
            }
            let vote = match inner.state {
                EnlistmentState::Preparing => inner.channel.phase1().map(Vote::Phase1),
                EnlistmentState::Phase0Preparing => {
                    if doomed {
                        inner.fabricate_rollback = true;
                    }
                    match &inner.channel {
                        Channel::Phase0(channel) => Some(Vote::Phase0(Arc::clone(channel))),
                        // The coordinator moved on to phase 1; the vote arrives there.
                        Channel::Phase1(_) => Some(Vote::Superseded),
                        Channel::Detached => None,
                    }
                }
                state => {
                    return Err(EnlistmentError::state_violation(format!(
                        "enlistment {} was prepared while in state {}",
                        self.id, state
                    )))
                }
            };
            let counted = if inner.state == EnlistmentState::Phase0Preparing {
                inner.count_phase0_vote()
            } else {
                false
            };
            if vote.is_none() {
                debug!(
                    "enlistment {}: no coordinator channel to vote on, rolling back",
                    self.id
                );
                inner.fabricate_rollback = true;
            }
            inner.state = EnlistmentState::Prepared;
            (vote, counted, inner.fabricate_rollback)
        };

        if counted {
            self.decrement_undecided();
        }

        let result = match &vote {
            Some(Vote::Phase1(channel)) => channel.vote_prepared(),
            Some(Vote::Phase0(channel)) => channel.phase0_vote(!fabricate),
            Some(Vote::Superseded) | None => Ok(()),
        };

        match result {
            Ok(()) => (),
            Err(err) if err.is_unavailable() => {
                debug!(
                    "enlistment {}: prepared vote not delivered, coordinator unreachable: {}",
                    self.id, err
                );
                return Ok(());
            }
            Err(ChannelError::ProtocolViolation) if matches!(vote, Some(Vote::Phase0(_))) => {
                debug!(
                    "enlistment {}: coordinator rejected the phase 0 vote, continuing in phase 1",
                    self.id
                );
                let mut inner = self.inner.lock();
                if !inner.channel.is_phase1() {
                    inner.channel = Channel::Detached;
                }
            }
            Err(err) => return Err(err.into()),
        }

        if fabricate {
            self.abort_request()?;
        }
        Ok(())
    }

    /// The resource is done with the enlistment: a read-only vote while preparing, or the
    /// acknowledgement of a commit, rollback or single phase commit.
    pub fn enlistment_done(self: &Arc<Self>) -> Result<(), EnlistmentError> {
        let (previous, channel, counted, fabricated, mut finish) = {
            let mut inner = self.inner.lock();
            if self.answer_ignored(&inner, "done") {
                return Ok(());
            }
            let previous = inner.state;
            let (channel, finish) = match previous {
                EnlistmentState::Active => (inner.channel.phase0(), false),
                EnlistmentState::Phase0Preparing => {
                    (inner.channel.phase0(), inner.fabricate_rollback)
                }
                EnlistmentState::Preparing
                | EnlistmentState::Committing
                | EnlistmentState::Aborting
                | EnlistmentState::SinglePhaseCommitting => (inner.channel.phase1(), true),
                state => {
                    return Err(EnlistmentError::state_violation(format!(
                        "enlistment {} was done while in state {}",
                        self.id, state
                    )))
                }
            };
            let counted = matches!(
                previous,
                EnlistmentState::Active | EnlistmentState::Phase0Preparing
            ) && inner.count_phase0_vote();
            inner.state = EnlistmentState::Done;
            (
                previous,
                channel,
                counted,
                inner.fabricate_rollback,
                finish,
            )
        };

        if counted {
            self.decrement_undecided();
        }

        let result = match (previous, channel) {
            (EnlistmentState::Active, Some(channel)) => channel.unenlist(),
            (EnlistmentState::Phase0Preparing, Some(channel)) => channel.phase0_vote(true),
            (EnlistmentState::Preparing, Some(channel)) => channel.vote_read_only(),
            (EnlistmentState::Committing, Some(channel)) => channel.acknowledge_commit(),
            (EnlistmentState::Aborting, Some(channel)) if !fabricated => {
                channel.acknowledge_abort()
            }
            (EnlistmentState::SinglePhaseCommitting, Some(channel)) => channel.vote_single_phase(),
            _ => Ok(()),
        };

        let result = match result {
            Ok(()) => Ok(()),
            Err(err) => {
                finish = true;
                self.swallow_unavailable(Err(err), "done notification")
            }
        };

        if finish {
            self.release();
        }
        result
    }

    /// The resource committed a single phase commit.
    pub fn committed(self: &Arc<Self>) -> Result<(), EnlistmentError> {
        self.finish_single_phase(EnlistmentState::Committed, None)
    }

    /// The resource aborted a single phase commit.
    pub fn aborted(self: &Arc<Self>, cause: Option<String>) -> Result<(), EnlistmentError> {
        self.finish_single_phase(EnlistmentState::Aborted, cause)
    }

    /// The resource can not tell whether a single phase commit took effect.
    pub fn in_doubt(self: &Arc<Self>, cause: Option<String>) -> Result<(), EnlistmentError> {
        self.finish_single_phase(EnlistmentState::InDoubt, cause)
    }

    /// The resource answers a prepare notification with a no vote.
    pub fn force_rollback(self: &Arc<Self>, cause: Option<String>) -> Result<(), EnlistmentError> {
        let (vote, counted) = {
            let mut inner = self.inner.lock();
            if self.answer_ignored(&inner, "rollback") {
                return Ok(());
            }
            let vote = match inner.state {
                EnlistmentState::Preparing => inner.channel.phase1().map(Vote::Phase1),
                EnlistmentState::Phase0Preparing => inner.channel.phase0().map(Vote::Phase0),
                state => {
                    return Err(EnlistmentError::state_violation(format!(
                        "enlistment {} was rolled back while in state {}",
                        self.id, state
                    )))
                }
            };
            let counted = inner.state == EnlistmentState::Phase0Preparing
                && inner.count_phase0_vote();
            inner.state = EnlistmentState::Aborted;
            (vote, counted)
        };

        warn!(
            "enlistment {}: resource forced a rollback: {}",
            self.id,
            cause.as_deref().unwrap_or("no cause given")
        );
        self.record_failure(cause);
        if counted {
            self.decrement_undecided();
        }

        let result = match vote {
            Some(Vote::Phase1(channel)) => channel.vote_failed(),
            Some(Vote::Phase0(channel)) => channel.phase0_vote(false),
            Some(Vote::Superseded) | None => Ok(()),
        };
        let result = self.swallow_unavailable(result, "failed vote");
        self.release();
        result
    }

    fn finish_single_phase(
        self: &Arc<Self>,
        outcome: EnlistmentState,
        cause: Option<String>,
    ) -> Result<(), EnlistmentError> {
        let channel = {
            let mut inner = self.inner.lock();
            if !inner.is_single_phase || inner.state != EnlistmentState::SinglePhaseCommitting {
                return Err(EnlistmentError::state_violation(format!(
                    "enlistment {} reported a single phase outcome while in state {}",
                    self.id, inner.state
                )));
            }
            inner.state = outcome;
            inner.channel.phase1()
        };

        if outcome != EnlistmentState::Committed {
            warn!(
                "enlistment {}: single phase commit ended {}: {}",
                self.id,
                outcome,
                cause.as_deref().unwrap_or("no cause given")
            );
            self.record_failure(cause);
        }

        let result = match channel {
            Some(channel) => match outcome {
                EnlistmentState::Committed => channel.vote_single_phase(),
                EnlistmentState::Aborted => channel.vote_failed(),
                _ => channel.vote_in_doubt(),
            },
            None => Ok(()),
        };
        let result = self.swallow_unavailable(result, "single phase outcome");
        self.release();
        result
    }

    /// Moves a prepared enlistment to the outcome learned during reenlistment.
    ///
    /// Returns `None` if the enlistment is no longer prepared. The caller delivers the returned
    /// notification after releasing any lock it holds.
    pub(crate) fn begin_outcome(self: &Arc<Self>, committed: bool) -> Option<OutcomeDelivery> {
        let mut inner = self.inner.lock();
        if inner.state != EnlistmentState::Prepared {
            return None;
        }
        inner.state = if committed {
            EnlistmentState::Committing
        } else {
            EnlistmentState::Aborting
        };
        Some(OutcomeDelivery {
            enlistment: Arc::clone(self),
            notification: inner.notification.clone(),
            committed,
        })
    }

    /// Ends the enlistment. Only the first call deregisters it.
    fn release(&self) {
        let first = {
            let mut inner = self.inner.lock();
            inner.notification = None;
            !std::mem::replace(&mut inner.released, true)
        };

        if first {
            self.services.reenlistment.forget(self.id);
            self.services.registry.deregister(self.id);
            debug!("enlistment {}: released", self.id);
        }
    }

    fn publish_coordinator_token(&self, coordinator_token: Vec<u8>) {
        if self.coordinator_token.set(coordinator_token).is_err() {
            debug!(
                "enlistment {}: coordinator token already recorded",
                self.id
            );
        }
    }

    fn publish_prepare_information(&self, coordinator_token: Vec<u8>) {
        let blob = recovery::encode(&RecoveryToken::new(
            self.transaction_id,
            self.services.resource_manager_id,
            self.services.node_identity.clone(),
            coordinator_token.clone(),
        ));
        self.publish_coordinator_token(coordinator_token);
        if self.recovery_information.set(blob).is_err() {
            debug!(
                "enlistment {}: recovery information already recorded",
                self.id
            );
        }
    }

    /// True if `answer` is the resource's late reply to a prepare the coordinator abandoned.
    fn answer_ignored(&self, inner: &EnlistmentInner, answer: &str) -> bool {
        if inner.prepare_abandoned {
            debug!(
                "enlistment {}: {} answer ignored, the coordinator already aborted",
                self.id, answer
            );
        }
        inner.prepare_abandoned
    }

    fn decrement_undecided(&self) {
        if let Some(transaction) = &self.transaction {
            transaction.decrement_undecided_enlistments();
        }
    }

    fn record_failure(&self, cause: Option<String>) {
        if let Some(transaction) = &self.transaction {
            transaction.record_failure(cause);
        }
    }

    fn swallow_unavailable(
        &self,
        result: Result<(), ChannelError>,
        call: &str,
    ) -> Result<(), EnlistmentError> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_unavailable() => {
                debug!(
                    "enlistment {}: {} not delivered, coordinator unreachable: {}",
                    self.id, call, err
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn swallow_all(&self, result: Result<(), ChannelError>, call: &str) {
        if let Err(err) = result {
            debug!("enlistment {}: {} not delivered: {}", self.id, call, err);
        }
    }
}

impl fmt::Debug for DurableEnlistment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DurableEnlistment")
            .field("id", &self.id)
            .field("transaction_id", &self.transaction_id)
            .field("state", &inner.state)
            .field("channel", &inner.channel)
            .field("released", &inner.released)
            .finish()
    }
}

enum Vote {
    Phase0(Arc<dyn CoordinatorChannel>),
    Phase1(Arc<dyn CoordinatorChannel>),
    Superseded,
}

/// A reenlistment outcome waiting to be delivered to the resource.
pub(crate) struct OutcomeDelivery {
    enlistment: Arc<DurableEnlistment>,
    notification: Option<Arc<dyn EnlistmentNotification>>,
    committed: bool,
}

impl OutcomeDelivery {
    pub(crate) fn deliver(self) {
        if let Some(notification) = self.notification {
            if self.committed {
                debug!("enlistment {}: recovered commit", self.enlistment.id);
                notification.commit(self.enlistment);
            } else {
                debug!("enlistment {}: recovered rollback", self.enlistment.id);
                notification.rollback(self.enlistment);
            }
        }
    }
}

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

//! The entry point resources use to enlist in transactions and to resume after a restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::enlistment::{
    DurableEnlistment, EnlistmentId, EnlistmentNotification, EnlistmentServices,
};
use crate::error::{EnlistmentError, InvalidStateError};
use crate::recovery;
use crate::reenlistment::ReenlistmentCoordinator;
use crate::registry::EnlistmentRegistry;
use crate::transaction::Transaction;

/// How a resource takes part in a transaction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EnlistmentOptions {
    /// The resource can commit in a single phase when it is the only durable participant.
    pub single_phase_capable: bool,
    /// The resource also receives a phase 0 prepare before phase 1 starts.
    pub enlist_during_phase0: bool,
}

/// The outcome a resource recorded for an enlistment before the process restarted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecoveredStatus {
    Aborted,
    Committed,
    /// The resource voted prepared and never learned the outcome.
    Prepared,
}

/// Creates and tracks the durable enlistments of one resource manager.
///
/// Enlistment ids are only unique within a resource manager, so the registry and reenlistment
/// coordinator it is built with must not be shared with another one. The reenlistment
/// coordinator is not stopped by dropping the resource manager; call
/// [`ReenlistmentCoordinator::shutdown`] when done.
pub struct ResourceManager {
    services: EnlistmentServices,
    next_enlistment_id: AtomicU64,
}

impl ResourceManager {
    pub fn id(&self) -> &Uuid {
        &self.services.resource_manager_id
    }

    pub fn node_identity(&self) -> &str {
        &self.services.node_identity
    }

    pub fn registry(&self) -> &Arc<dyn EnlistmentRegistry> {
        &self.services.registry
    }

    pub fn reenlistment(&self) -> &Arc<ReenlistmentCoordinator> {
        &self.services.reenlistment
    }

    /// Enlists a resource in `transaction`.
    ///
    /// # Errors
    ///
    /// Returns a `ProtocolStateViolation` if phase 1 of the transaction has already started.
    pub fn enlist_durable(
        &self,
        transaction: &Arc<Transaction>,
        notification: Arc<dyn EnlistmentNotification>,
        options: EnlistmentOptions,
    ) -> Result<Arc<DurableEnlistment>, EnlistmentError> {
        if transaction.is_too_late_for_enlistments() {
            return Err(EnlistmentError::state_violation(format!(
                "transaction {} is too late for new enlistments",
                transaction.id()
            )));
        }

        let enlistment = Arc::new(DurableEnlistment::new(
            self.next_id(),
            Arc::clone(transaction),
            notification,
            options.single_phase_capable,
            options.enlist_during_phase0,
            self.services.clone(),
        ));

        if options.enlist_during_phase0 {
            transaction.increment_undecided_enlistments();
        }
        self.services.registry.register(Arc::clone(&enlistment));

        debug!(
            "enlistment {}: enlisted in transaction {}",
            enlistment.id(),
            transaction.id()
        );
        Ok(enlistment)
    }

    /// Resumes an enlistment from the recovery blob a resource persisted before restarting.
    ///
    /// A committed or aborted enlistment receives its commit or rollback notification right away;
    /// a prepared one is resolved through reenlistment.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecoveryData` if the blob can not be decoded, a
    /// `ProtocolStateViolation` if it belongs to another resource manager, and an internal error
    /// if the reenlistment coordinator can not take the enlistment. A failed recovery leaves
    /// nothing registered.
    pub fn recover(
        &self,
        recovery_information: &[u8],
        status: RecoveredStatus,
        notification: Arc<dyn EnlistmentNotification>,
    ) -> Result<Arc<DurableEnlistment>, EnlistmentError> {
        let token = recovery::decode(recovery_information)?;
        if token.resource_manager_id != self.services.resource_manager_id {
            return Err(EnlistmentError::state_violation(format!(
                "recovery information belongs to resource manager {}, not {}",
                token.resource_manager_id, self.services.resource_manager_id
            )));
        }

        let enlistment = Arc::new(DurableEnlistment::recovered(
            self.next_id(),
            token,
            recovery_information.to_vec(),
            notification,
            self.services.clone(),
        ));
        self.services.registry.register(Arc::clone(&enlistment));

        info!(
            "enlistment {}: recovered {:?} enlistment in transaction {}",
            enlistment.id(),
            status,
            enlistment.transaction_id()
        );

        let delivery = match status {
            RecoveredStatus::Aborted => Ok(enlistment.begin_outcome(false)),
            RecoveredStatus::Committed => self.services.reenlistment.track(|lists| {
                lists.track_pending_removal(enlistment.id());
                enlistment.begin_outcome(true)
            }),
            RecoveredStatus::Prepared => self
                .services
                .reenlistment
                .track_in_doubt(*enlistment.transaction_id(), enlistment.id())
                .map(|_| None),
        };
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(err) => {
                warn!("enlistment {}: recovery abandoned: {}", enlistment.id(), err);
                self.services.registry.deregister(enlistment.id());
                return Err(err.into());
            }
        };

        if let Some(delivery) = delivery {
            delivery.deliver();
        }
        Ok(enlistment)
    }

    /// Tells every live enlistment that the coordinator went away.
    pub fn coordinator_down(&self) -> Result<(), EnlistmentError> {
        let enlistments = self.services.registry.enlistments();
        info!(
            "coordinator unavailable, {} enlistments affected",
            enlistments.len()
        );

        for enlistment in enlistments {
            enlistment.coordinator_unavailable()?;
        }
        Ok(())
    }

    fn next_id(&self) -> EnlistmentId {
        self.next_enlistment_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct ResourceManagerBuilder {
    id: Option<Uuid>,
    node_identity: Option<String>,
    reenlistment: Option<Arc<ReenlistmentCoordinator>>,
    registry: Option<Arc<dyn EnlistmentRegistry>>,
}

impl ResourceManagerBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            node_identity: None,
            reenlistment: None,
            registry: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_node_identity(mut self, node_identity: String) -> Self {
        self.node_identity = Some(node_identity);
        self
    }

    pub fn with_reenlistment(mut self, reenlistment: Arc<ReenlistmentCoordinator>) -> Self {
        self.reenlistment = Some(reenlistment);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn EnlistmentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ResourceManager, InvalidStateError> {
        let resource_manager_id = self
            .id
            .ok_or_else(|| InvalidStateError::with_message("missing id field".into()))?;

        let node_identity = self
            .node_identity
            .ok_or_else(|| InvalidStateError::with_message("missing node_identity field".into()))?;

        let reenlistment = self
            .reenlistment
            .ok_or_else(|| InvalidStateError::with_message("missing reenlistment field".into()))?;

        let registry = self
            .registry
            .ok_or_else(|| InvalidStateError::with_message("missing registry field".into()))?;

        Ok(ResourceManager {
            services: EnlistmentServices {
                resource_manager_id,
                node_identity,
                registry,
                reenlistment,
            },
            next_enlistment_id: AtomicU64::new(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::enlistment::EnlistmentState;
    use crate::recovery::RecoveryToken;
    use crate::reenlistment::TransactionOutcome;
    use crate::test_support::{fixture, wait_until, RecordingResource, ResourceCall};

    use super::*;

    fn blob(resource_manager_id: Uuid) -> Vec<u8> {
        recovery::encode(&RecoveryToken::new(
            Uuid::from_u128(42),
            resource_manager_id,
            "node-a".into(),
            vec![1, 2, 3],
        ))
    }

    /// Test that the builder reports each missing field.
    #[test]
    fn build_requires_fields() {
        let fixture = fixture();
        let err = ResourceManagerBuilder::new()
            .with_node_identity("node-a".into())
            .with_registry(fixture.registry.clone())
            .with_reenlistment(Arc::clone(&fixture.reenlistment))
            .build();
        assert!(err.is_err());

        let err = ResourceManagerBuilder::new()
            .with_id(Uuid::nil())
            .with_registry(fixture.registry.clone())
            .with_reenlistment(Arc::clone(&fixture.reenlistment))
            .build();
        assert!(err.is_err());
    }

    /// Test that enlisting registers the enlistment, counts phase 0 enlistments as undecided and
    /// is refused once phase 1 started.
    #[test]
    fn enlist_durable() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture();
        let transaction = Arc::new(Transaction::new(Uuid::from_u128(1)));
        let resource = RecordingResource::new();

        let first = fixture.enlist(&transaction, &resource, EnlistmentOptions::default());
        let second = fixture.enlist(
            &transaction,
            &resource,
            EnlistmentOptions {
                enlist_during_phase0: true,
                ..Default::default()
            },
        );
        assert_ne!(first.id(), second.id());
        assert_eq!(fixture.registry.len(), 2);
        assert_eq!(transaction.undecided_enlistments(), 1);
        assert_eq!(first.state(), EnlistmentState::Active);
        assert!(fixture.registry.lookup(first.id()).is_some());

        first.prepare_request(false, vec![1])?;
        assert!(transaction.is_too_late_for_enlistments());
        assert!(fixture
            .manager
            .enlist_durable(&transaction, resource, EnlistmentOptions::default())
            .is_err());

        Ok(())
    }

    /// Test that a recovered committed enlistment receives one commit, stays tracked until the
    /// resource acknowledges, and is released afterwards.
    #[test]
    fn recover_committed() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture();
        let resource = RecordingResource::new();

        let enlistment = fixture.manager.recover(
            &blob(*fixture.manager.id()),
            RecoveredStatus::Committed,
            resource.clone(),
        )?;
        assert_eq!(enlistment.state(), EnlistmentState::Committing);
        assert_eq!(resource.count(ResourceCall::Commit), 1);
        assert_eq!(enlistment.transaction_id(), &Uuid::from_u128(42));
        assert!(enlistment.transaction().is_none());
        assert_eq!(fixture.reenlistment.pending_removal_count(), 1);

        enlistment.enlistment_done()?;
        assert!(enlistment.is_released());
        assert_eq!(fixture.registry.len(), 0);
        assert!(wait_until(|| !fixture.reenlistment.is_running()));

        Ok(())
    }

    /// Test that a recovered aborted enlistment receives one rollback and no reenlistment starts.
    #[test]
    fn recover_aborted() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture();
        let resource = RecordingResource::new();

        let enlistment = fixture.manager.recover(
            &blob(*fixture.manager.id()),
            RecoveredStatus::Aborted,
            resource.clone(),
        )?;
        assert_eq!(enlistment.state(), EnlistmentState::Aborting);
        assert_eq!(resource.calls(), vec![ResourceCall::Rollback]);
        assert!(!fixture.reenlistment.is_running());

        enlistment.enlistment_done()?;
        assert!(enlistment.is_released());

        Ok(())
    }

    /// Test that a recovered prepared enlistment is resolved through the coordinator, and that
    /// the outcome query receives the token from the blob.
    #[test]
    fn recover_prepared() -> Result<(), Box<dyn std::error::Error>> {
        let fixture = fixture();
        let resource = RecordingResource::with_auto_reply();
        fixture.query.set_outcome(TransactionOutcome::Committed);

        let enlistment = fixture.manager.recover(
            &blob(*fixture.manager.id()),
            RecoveredStatus::Prepared,
            resource.clone(),
        )?;

        assert!(wait_until(|| enlistment.is_released()));
        assert_eq!(resource.calls(), vec![ResourceCall::Commit]);
        assert_eq!(
            fixture.query.last_token().map(|token| token.coordinator_token),
            Some(vec![1, 2, 3])
        );
        assert!(wait_until(|| fixture.query.completions() == 1));

        Ok(())
    }

    /// Test that recovery rejects malformed blobs and blobs of another resource manager.
    #[test]
    fn recover_rejects_bad_blobs() {
        let fixture = fixture();
        let resource = RecordingResource::new();

        let result = fixture
            .manager
            .recover(&[1, 2, 3], RecoveredStatus::Prepared, resource.clone());
        assert!(matches!(
            result,
            Err(EnlistmentError::MalformedRecoveryData(_))
        ));

        let result = fixture.manager.recover(
            &blob(Uuid::from_u128(7)),
            RecoveredStatus::Prepared,
            resource.clone(),
        );
        assert!(matches!(
            result,
            Err(EnlistmentError::ProtocolStateViolation(_))
        ));
        assert_eq!(fixture.registry.len(), 0);
        assert!(resource.calls().is_empty());
    }

    /// Test that a recovery the reenlistment coordinator refuses leaves no enlistment registered
    /// and never notifies the resource.
    #[test]
    fn recover_after_shutdown() {
        let fixture = fixture();
        let resource = RecordingResource::new();
        fixture.reenlistment.shutdown();

        for status in [RecoveredStatus::Prepared, RecoveredStatus::Committed] {
            let result = fixture
                .manager
                .recover(&blob(*fixture.manager.id()), status, resource.clone());
            assert!(matches!(result, Err(EnlistmentError::Internal(_))));
        }

        assert_eq!(fixture.registry.len(), 0);
        assert_eq!(fixture.reenlistment.pending_removal_count(), 0);
        assert!(resource.calls().is_empty());
    }
}

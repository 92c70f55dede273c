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

//! The parent transaction state that enlistments read and update.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

/// A distributed transaction as seen by its durable enlistments.
///
/// The application-facing transaction API owns the decision to commit or abort; this handle only
/// carries the flags and counters the enlistment protocol consults.
#[derive(Debug)]
pub struct Transaction {
    id: Uuid,
    committable: bool,
    commit_called: AtomicBool,
    doomed: AtomicBool,
    too_late_for_enlistments: AtomicBool,
    undecided_enlistments: AtomicUsize,
    first_failure: Mutex<Option<String>>,
}

impl Transaction {
    /// Creates a handle for a transaction the application can not commit directly (a dependent
    /// or imported transaction).
    pub fn new(id: Uuid) -> Self {
        Self::build(id, false)
    }

    /// Creates a handle for a transaction whose commit is driven by this application.
    pub fn committable(id: Uuid) -> Self {
        Self::build(id, true)
    }

    fn build(id: Uuid, committable: bool) -> Self {
        Transaction {
            id,
            committable,
            commit_called: AtomicBool::new(false),
            doomed: AtomicBool::new(false),
            too_late_for_enlistments: AtomicBool::new(false),
            undecided_enlistments: AtomicUsize::new(0),
            first_failure: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// Records that the application asked to commit.
    pub fn mark_commit_called(&self) {
        self.commit_called.store(true, Ordering::SeqCst);
    }

    /// True if this is a committable transaction whose commit has not been requested yet.
    ///
    /// A phase 0 request arriving in that window can only come from a coordinator failure, so
    /// enlistments vote no instead of preparing.
    pub fn commit_not_yet_called(&self) -> bool {
        self.committable && !self.commit_called.load(Ordering::SeqCst)
    }

    /// Marks the transaction as certain to abort.
    pub fn doom(&self) {
        self.doomed.store(true, Ordering::SeqCst);
    }

    pub fn is_doomed(&self) -> bool {
        self.doomed.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_too_late_for_enlistments(&self) {
        self.too_late_for_enlistments.store(true, Ordering::SeqCst);
    }

    /// True once the coordinator has started phase 1; no new durable enlistment may join.
    pub fn is_too_late_for_enlistments(&self) -> bool {
        self.too_late_for_enlistments.load(Ordering::SeqCst)
    }

    pub(crate) fn increment_undecided_enlistments(&self) {
        self.undecided_enlistments.fetch_add(1, Ordering::SeqCst);
    }

    /// Records one phase 0 vote.
    pub(crate) fn decrement_undecided_enlistments(&self) {
        let previous = self.undecided_enlistments.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |count| count.checked_sub(1),
        );
        if previous.is_err() {
            warn!(
                "transaction {}: phase 0 vote recorded with no undecided enlistments",
                self.id
            );
        }
    }

    /// The number of phase 0 enlistments which have not voted yet.
    pub fn undecided_enlistments(&self) -> usize {
        self.undecided_enlistments.load(Ordering::SeqCst)
    }

    /// Records the cause of the transaction's failure unless one was recorded already.
    pub fn record_failure(&self, cause: Option<String>) {
        if let Some(cause) = cause {
            let mut first_failure = self.first_failure.lock();
            if first_failure.is_none() {
                *first_failure = Some(cause);
            }
        }
    }

    pub fn first_failure(&self) -> Option<String> {
        self.first_failure.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the first recorded failure is kept and later ones, or a missing cause, do not
    /// overwrite it.
    #[test]
    fn test_first_failure_wins() {
        let transaction = Transaction::new(Uuid::nil());
        assert_eq!(transaction.first_failure(), None);

        transaction.record_failure(None);
        assert_eq!(transaction.first_failure(), None);

        transaction.record_failure(Some("disk full".into()));
        transaction.record_failure(Some("timeout".into()));
        assert_eq!(transaction.first_failure(), Some("disk full".to_string()));
    }

    /// Test that only a committable transaction reports a missing commit call.
    #[test]
    fn test_commit_not_yet_called() {
        let dependent = Transaction::new(Uuid::nil());
        assert!(!dependent.commit_not_yet_called());

        let committable = Transaction::committable(Uuid::nil());
        assert!(committable.commit_not_yet_called());
        committable.mark_commit_called();
        assert!(!committable.commit_not_yet_called());
    }

    /// Test that the undecided counter never underflows.
    #[test]
    fn test_undecided_counter() {
        let transaction = Transaction::new(Uuid::nil());
        transaction.increment_undecided_enlistments();
        transaction.decrement_undecided_enlistments();
        transaction.decrement_undecided_enlistments();
        assert_eq!(transaction.undecided_enlistments(), 0);
    }
}

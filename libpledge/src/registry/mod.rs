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

//! The table of live enlistments.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::enlistment::{DurableEnlistment, EnlistmentId};

/// Tracks every enlistment that has not been released yet.
///
/// Enlistments register themselves when created and deregister exactly once when released.
pub trait EnlistmentRegistry: Send + Sync {
    fn register(&self, enlistment: Arc<DurableEnlistment>);

    /// Removes an enlistment. Removing an unknown id has no effect.
    fn deregister(&self, id: EnlistmentId);

    fn lookup(&self, id: EnlistmentId) -> Option<Arc<DurableEnlistment>>;

    /// Returns every registered enlistment.
    fn enlistments(&self) -> Vec<Arc<DurableEnlistment>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory [`EnlistmentRegistry`].
#[derive(Default)]
pub struct EnlistmentTable {
    enlistments: RwLock<HashMap<EnlistmentId, Arc<DurableEnlistment>>>,
}

impl EnlistmentTable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EnlistmentRegistry for EnlistmentTable {
    fn register(&self, enlistment: Arc<DurableEnlistment>) {
        let id = enlistment.id();
        if self.enlistments.write().insert(id, enlistment).is_some() {
            warn!("enlistment {} registered twice", id);
        }
    }

    fn deregister(&self, id: EnlistmentId) {
        self.enlistments.write().remove(&id);
    }

    fn lookup(&self, id: EnlistmentId) -> Option<Arc<DurableEnlistment>> {
        self.enlistments.read().get(&id).cloned()
    }

    fn enlistments(&self) -> Vec<Arc<DurableEnlistment>> {
        self.enlistments.read().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.enlistments.read().len()
    }
}

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

//! Durable enlistments: the per-resource participant in a distributed transaction.
//!
//! A [`DurableEnlistment`] sits between a resource (through [`EnlistmentNotification`]) and the
//! transaction coordinator (through [`CoordinatorChannel`]). Coordinator notifications are
//! forwarded to the resource, and the resource's answers are forwarded back to the coordinator,
//! with the enlistment's state machine rejecting anything out of protocol.

mod channel;
mod durable;
mod notification;
mod state;

use std::sync::Arc;

use uuid::Uuid;

use crate::reenlistment::ReenlistmentCoordinator;
use crate::registry::EnlistmentRegistry;

pub use channel::{Channel, CoordinatorChannel};
pub use durable::DurableEnlistment;
pub use notification::EnlistmentNotification;
pub use state::EnlistmentState;

/// Process-local identifier of an enlistment, unique per resource manager.
pub type EnlistmentId = u64;

/// The shared collaborators every enlistment of one resource manager is wired to.
#[derive(Clone)]
pub(crate) struct EnlistmentServices {
    pub resource_manager_id: Uuid,
    pub node_identity: String,
    pub registry: Arc<dyn EnlistmentRegistry>,
    pub reenlistment: Arc<ReenlistmentCoordinator>,
}

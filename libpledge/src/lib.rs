// Copyright 2021 Cargill Incorporated
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

//! Durable resource enlistments for two-phase commit transactions.
//!
//! A [`ResourceManager`] enlists resources in transactions driven by an external coordinator.
//! Each [`DurableEnlistment`] relays the coordinator's phase 0, prepare, commit and abort
//! requests to its resource and the resource's answers back to the coordinator. Enlistments left
//! in doubt by a coordinator failure are resolved in the background by the
//! [`ReenlistmentCoordinator`](reenlistment::ReenlistmentCoordinator), and a restarted process
//! resumes them from their recovery blob with [`ResourceManager::recover`].

#[macro_use]
extern crate log;

pub mod enlistment;
pub mod error;
pub mod recovery;
pub mod reenlistment;
pub mod registry;
mod resource_manager;
#[cfg(test)]
mod test_support;
mod transaction;

pub use enlistment::{
    Channel, CoordinatorChannel, DurableEnlistment, EnlistmentId, EnlistmentNotification,
    EnlistmentState,
};
pub use resource_manager::{
    EnlistmentOptions, RecoveredStatus, ResourceManager, ResourceManagerBuilder,
};
pub use transaction::Transaction;

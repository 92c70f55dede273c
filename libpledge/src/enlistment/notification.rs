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

use std::sync::Arc;

use super::DurableEnlistment;

/// The resource-facing half of an enlistment.
///
/// Each notification hands the resource the enlistment to answer through. The answer may be
/// given synchronously from inside the callback or later from any thread:
///
/// - `prepare` is answered with [`DurableEnlistment::prepared`],
///   [`DurableEnlistment::enlistment_done`] (read-only) or [`DurableEnlistment::force_rollback`]
/// - `commit` and `rollback` are answered with [`DurableEnlistment::enlistment_done`]
/// - `single_phase_commit` is answered with [`DurableEnlistment::committed`],
///   [`DurableEnlistment::aborted`] or [`DurableEnlistment::in_doubt`]
pub trait EnlistmentNotification: Send + Sync {
    fn prepare(&self, enlistment: Arc<DurableEnlistment>);

    fn commit(&self, enlistment: Arc<DurableEnlistment>);

    fn rollback(&self, enlistment: Arc<DurableEnlistment>);

    fn single_phase_commit(&self, enlistment: Arc<DurableEnlistment>);
}

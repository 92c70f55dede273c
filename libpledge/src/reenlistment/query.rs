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

use crate::error::ChannelError;
use crate::recovery::RecoveryToken;

/// The coordinator's answer to an outcome query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionOutcome {
    Committed,
    Aborted,
    /// The coordinator has not decided yet; ask again later.
    Unknown,
}

/// Asks a (possibly restarted) coordinator how an in-doubt transaction ended.
pub trait OutcomeQuery: Send + Sync {
    fn query_outcome(&self, token: &RecoveryToken) -> Result<TransactionOutcome, ChannelError>;

    /// Tells the coordinator every in-doubt enlistment of this process has been resolved.
    fn recovery_complete(&self) -> Result<(), ChannelError>;
}

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
use std::sync::Arc;

use crate::error::ChannelError;

/// The coordinator-facing half of an enlistment.
///
/// Implementations carry votes and acknowledgements to the transaction coordinator over whatever
/// transport connects the two processes. Every method may fail; only
/// [`ChannelError::ConnectionDown`] and [`ChannelError::CoordinatorUnavailable`] are recovered
/// from by the enlistment.
pub trait CoordinatorChannel: Send + Sync {
    /// Answers a phase 1 prepare request with a read-only vote.
    fn vote_read_only(&self) -> Result<(), ChannelError>;

    /// Answers a phase 1 prepare request with a yes vote.
    fn vote_prepared(&self) -> Result<(), ChannelError>;

    /// Answers a phase 1 prepare request with a no vote.
    fn vote_failed(&self) -> Result<(), ChannelError>;

    /// Answers a single phase commit request with a committed outcome.
    fn vote_single_phase(&self) -> Result<(), ChannelError>;

    /// Answers a single phase commit request with an unknown outcome.
    fn vote_in_doubt(&self) -> Result<(), ChannelError>;

    fn acknowledge_commit(&self) -> Result<(), ChannelError>;

    fn acknowledge_abort(&self) -> Result<(), ChannelError>;

    /// Answers a phase 0 request; `true` means the resource is prepared or read-only.
    fn phase0_vote(&self, vote: bool) -> Result<(), ChannelError>;

    /// Withdraws a phase 0 enlistment before phase 0 started.
    fn unenlist(&self) -> Result<(), ChannelError>;
}

/// The coordinator channel currently driving an enlistment.
///
/// An enlistment is answered through at most one channel at a time. Attaching a phase 1 channel
/// supersedes a phase 0 attachment.
#[derive(Clone, Default)]
pub enum Channel {
    #[default]
    Detached,
    Phase0(Arc<dyn CoordinatorChannel>),
    Phase1(Arc<dyn CoordinatorChannel>),
}

impl Channel {
    pub fn phase0(&self) -> Option<Arc<dyn CoordinatorChannel>> {
        match self {
            Channel::Phase0(channel) => Some(Arc::clone(channel)),
            _ => None,
        }
    }

    pub fn phase1(&self) -> Option<Arc<dyn CoordinatorChannel>> {
        match self {
            Channel::Phase1(channel) => Some(Arc::clone(channel)),
            _ => None,
        }
    }

    pub fn is_phase1(&self) -> bool {
        matches!(self, Channel::Phase1(_))
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Channel::Detached => f.write_str("Detached"),
            Channel::Phase0(_) => f.write_str("Phase0"),
            Channel::Phase1(_) => f.write_str("Phase1"),
        }
    }
}

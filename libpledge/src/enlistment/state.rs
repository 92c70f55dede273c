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

use std::fmt::{Display, Formatter, Result as FormatResult};

/// The protocol state of a durable enlistment.
///
/// ```text
/// Active -> Phase0Preparing | Preparing | SinglePhaseCommitting
///        -> Prepared -> Committing | Aborting -> Done
/// ```
///
/// `Committed`, `Aborted`, `InDoubt` and `Done` are terminal: notifications arriving in these
/// states are answered with protocol defaults and never reach the resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EnlistmentState {
    Active,
    Phase0Preparing,
    Preparing,
    SinglePhaseCommitting,
    Prepared,
    Committing,
    Committed,
    Aborting,
    Aborted,
    InDoubt,
    Done,
}

impl EnlistmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnlistmentState::Committed
                | EnlistmentState::Aborted
                | EnlistmentState::InDoubt
                | EnlistmentState::Done
        )
    }

    /// True while a Prepare (phase 0 or phase 1) or single phase commit notification is waiting
    /// for the resource to answer.
    pub fn is_preparing(&self) -> bool {
        matches!(
            self,
            EnlistmentState::Phase0Preparing
                | EnlistmentState::Preparing
                | EnlistmentState::SinglePhaseCommitting
        )
    }
}

impl Display for EnlistmentState {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        let name = match self {
            EnlistmentState::Active => "Active",
            EnlistmentState::Phase0Preparing => "Phase0Preparing",
            EnlistmentState::Preparing => "Preparing",
            EnlistmentState::SinglePhaseCommitting => "SinglePhaseCommitting",
            EnlistmentState::Prepared => "Prepared",
            EnlistmentState::Committing => "Committing",
            EnlistmentState::Committed => "Committed",
            EnlistmentState::Aborting => "Aborting",
            EnlistmentState::Aborted => "Aborted",
            EnlistmentState::InDoubt => "InDoubt",
            EnlistmentState::Done => "Done",
        };
        f.write_str(name)
    }
}

// Copyright 2022 Cargill Incorporated
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

//! Contains EnlistmentError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

use super::ChannelError;
use super::InternalError;
use super::InvalidStateError;
use super::MalformedRecoveryDataError;

/// An error which can occur while an enlistment is processing a notification or an outcome.
#[derive(Debug)]
pub enum EnlistmentError {
    /// The operation can not be accepted in the enlistment's current state.
    ///
    /// This always indicates a bug in the caller (the resource or the coordinator transport) and
    /// is never retried.
    ProtocolStateViolation(InvalidStateError),

    /// A recovery blob could not be decoded.
    MalformedRecoveryData(MalformedRecoveryDataError),

    /// The coordinator channel failed in a way that could not be handled locally.
    Channel(ChannelError),

    /// The enlistment could not complete the operation due to an unexpected internal error.
    Internal(InternalError),
}

impl EnlistmentError {
    pub(crate) fn state_violation(message: String) -> Self {
        EnlistmentError::ProtocolStateViolation(InvalidStateError::with_message(message))
    }
}

impl Error for EnlistmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EnlistmentError::ProtocolStateViolation(e) => Some(e),
            EnlistmentError::MalformedRecoveryData(e) => Some(e),
            EnlistmentError::Channel(e) => Some(e),
            EnlistmentError::Internal(e) => Some(e),
        }
    }
}

impl Display for EnlistmentError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            EnlistmentError::ProtocolStateViolation(e) => write!(f, "{}", e),
            EnlistmentError::MalformedRecoveryData(e) => write!(f, "{}", e),
            EnlistmentError::Channel(e) => write!(f, "{}", e),
            EnlistmentError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl From<InvalidStateError> for EnlistmentError {
    fn from(err: InvalidStateError) -> Self {
        EnlistmentError::ProtocolStateViolation(err)
    }
}

impl From<MalformedRecoveryDataError> for EnlistmentError {
    fn from(err: MalformedRecoveryDataError) -> Self {
        EnlistmentError::MalformedRecoveryData(err)
    }
}

impl From<ChannelError> for EnlistmentError {
    fn from(err: ChannelError) -> Self {
        EnlistmentError::Channel(err)
    }
}

impl From<InternalError> for EnlistmentError {
    fn from(err: InternalError) -> Self {
        EnlistmentError::Internal(err)
    }
}

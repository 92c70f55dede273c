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

//! Contains ChannelError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

use super::InternalError;

/// A failure reported by a coordinator channel or an outcome query.
#[derive(Debug)]
pub enum ChannelError {
    /// The connection to the coordinator was lost during the call.
    ConnectionDown,

    /// The coordinator process is not available.
    CoordinatorUnavailable,

    /// The coordinator rejected the call as out of protocol.
    ProtocolViolation,

    /// Any other transport failure.
    Other(InternalError),
}

impl ChannelError {
    /// Returns true if the failure means the coordinator can not be reached.
    ///
    /// These are the only failures an enlistment recovers from locally; the true outcome is
    /// resolved later through reenlistment.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ChannelError::ConnectionDown | ChannelError::CoordinatorUnavailable
        )
    }
}

impl Error for ChannelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ChannelError::Other(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for ChannelError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            ChannelError::ConnectionDown => f.write_str("connection to the coordinator is down"),
            ChannelError::CoordinatorUnavailable => f.write_str("coordinator is not available"),
            ChannelError::ProtocolViolation => {
                f.write_str("coordinator rejected the call as a protocol violation")
            }
            ChannelError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl From<InternalError> for ChannelError {
    fn from(err: InternalError) -> Self {
        ChannelError::Other(err)
    }
}

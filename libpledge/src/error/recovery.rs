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

//! Contains MalformedRecoveryDataError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// A recovery blob could not be decoded.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MalformedRecoveryDataError {
    message: String,
}

impl MalformedRecoveryDataError {
    pub fn with_message(message: String) -> Self {
        MalformedRecoveryDataError { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Error for MalformedRecoveryDataError {}

impl Display for MalformedRecoveryDataError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        write!(f, "malformed recovery data: {}", self.message)
    }
}

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
use std::time::Duration;

use crate::error::InvalidStateError;
use crate::registry::EnlistmentRegistry;

use super::OutcomeQuery;
use super::ReenlistmentCoordinator;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
pub struct ReenlistmentCoordinatorBuilder {
    outcome_query: Option<Arc<dyn OutcomeQuery>>,
    poll_interval: Option<Duration>,
    registry: Option<Arc<dyn EnlistmentRegistry>>,
}

impl ReenlistmentCoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            outcome_query: None,
            poll_interval: None,
            registry: None,
        }
    }

    pub fn with_outcome_query(mut self, outcome_query: Arc<dyn OutcomeQuery>) -> Self {
        self.outcome_query = Some(outcome_query);
        self
    }

    /// Sets how long the worker waits between attempts to resolve in-doubt enlistments.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn EnlistmentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<ReenlistmentCoordinator, InvalidStateError> {
        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);

        let outcome_query = self
            .outcome_query
            .ok_or_else(|| InvalidStateError::with_message("missing outcome_query field".into()))?;

        let registry = self
            .registry
            .ok_or_else(|| InvalidStateError::with_message("missing registry field".into()))?;

        if poll_interval.is_zero() {
            return Err(InvalidStateError::with_message(
                "poll_interval must be greater than zero".into(),
            ));
        }

        Ok(ReenlistmentCoordinator::new(
            registry,
            outcome_query,
            poll_interval,
        ))
    }
}

// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::common::config;

/// Error message returned by operators that observe a cancelled query.
pub const CANCELLED_MSG: &str = "query cancelled";

/// Query-level knobs consulted by operators.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub batch_size: Option<i32>,
}

/// Per-fragment-instance execution context.
///
/// Clones share the cancellation flag and the first recorded error, so a driver holding a
/// clone observes `cancel()` issued through any other clone.
#[derive(Clone, Debug, Default)]
pub struct RuntimeState {
    query_options: Option<QueryOptions>,
    cancelled: Arc<AtomicBool>,
    error_state: Arc<RuntimeErrorState>,
}

#[derive(Debug, Default)]
pub struct RuntimeErrorState {
    error: Mutex<Option<String>>,
}

impl RuntimeErrorState {
    /// Keeps the first error; later ones are dropped.
    pub fn set_error(&self, err: String) {
        let mut guard = self.error.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            *guard = Some(err);
        }
    }

    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl RuntimeState {
    pub fn new(query_options: Option<QueryOptions>) -> Self {
        Self {
            query_options,
            ..Self::default()
        }
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self::new(Some(QueryOptions {
            batch_size: i32::try_from(batch_size).ok(),
        }))
    }

    pub fn query_options(&self) -> Option<&QueryOptions> {
        self.query_options.as_ref()
    }

    /// Maximum row count per output chunk.
    ///
    /// The query-level batch size wins over the configured default; the result is never 0.
    pub fn chunk_size(&self) -> usize {
        self.query_options
            .as_ref()
            .and_then(|opts| opts.batch_size)
            .filter(|v| *v > 0)
            .map(|v| v as usize)
            .unwrap_or_else(config::chunk_size)
            .max(1)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self) -> Result<(), String> {
        if self.is_cancelled() {
            return Err(CANCELLED_MSG.to_string());
        }
        Ok(())
    }

    pub fn error_state(&self) -> Arc<RuntimeErrorState> {
        Arc::clone(&self.error_state)
    }

    pub fn error(&self) -> Option<String> {
        self.error_state.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_batch_size_wins() {
        assert_eq!(RuntimeState::with_batch_size(7).chunk_size(), 7);
    }

    #[test]
    fn non_positive_batch_size_falls_back() {
        let state = RuntimeState::new(Some(QueryOptions {
            batch_size: Some(0),
        }));
        assert!(state.chunk_size() >= 1);
    }

    #[test]
    fn cancel_is_shared_by_clones() {
        let state = RuntimeState::default();
        let driver_copy = state.clone();
        assert!(driver_copy.check_cancelled().is_ok());
        state.cancel();
        assert!(driver_copy.is_cancelled());
        assert_eq!(driver_copy.check_cancelled().unwrap_err(), CANCELLED_MSG);
    }

    #[test]
    fn first_error_is_kept() {
        let state = RuntimeState::default();
        state.error_state().set_error("first".to_string());
        state.error_state().set_error("second".to_string());
        assert_eq!(state.error().as_deref(), Some("first"));
    }
}

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

//! Per-query cancellation state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use altair_common::{AltairError, Result};

/// Shared cancel flag plus the plan deadline. Workers check it between
/// blocks, never between rows; a tripped context abandons partial state and
/// surfaces `Canceled`.
#[derive(Debug, Clone)]
pub struct QueryContext {
    canceled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that expires `deadline_ms` from now. Zero means no
    /// deadline.
    pub fn new(deadline_ms: u64) -> Self {
        Self {
            canceled: Arc::new(AtomicBool::new(false)),
            deadline: (deadline_ms > 0)
                .then(|| Instant::now() + Duration::from_millis(deadline_ms)),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Mark the query canceled (client gone, shutdown).
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
            || self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }

    /// Error out if the query was canceled or its deadline passed.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            Err(AltairError::Canceled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared() {
        let ctx = QueryContext::unbounded();
        let clone = ctx.clone();
        assert!(ctx.check().is_ok());
        clone.cancel();
        assert!(matches!(ctx.check(), Err(AltairError::Canceled)));
    }

    #[test]
    fn expired_deadline_cancels() {
        let ctx = QueryContext::new(1);
        std::thread::sleep(Duration::from_millis(5));
        assert!(ctx.is_canceled());
    }
}

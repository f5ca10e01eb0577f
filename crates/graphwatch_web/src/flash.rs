/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Success,
    Info,
    Warning,
    Error,
}

impl FlashKind {
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub kind: FlashKind,
    pub text: String,
}

struct Pending {
    touched: Instant,
    items: Vec<Flash>,
}

/// One-shot messages per session token, shown on the next dashboard view.
#[derive(Clone, Default)]
pub struct FlashStore {
    inner: Arc<Mutex<HashMap<String, Pending>>>,
}

impl FlashStore {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Pending>> {
        match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, token: &str, kind: FlashKind, text: impl Into<String>) {
        let mut map = self.lock();
        let pending = map.entry(token.to_string()).or_insert_with(|| Pending {
            touched: Instant::now(),
            items: Vec::new(),
        });
        pending.touched = Instant::now();
        pending.items.push(Flash {
            kind,
            text: text.into(),
        });
    }

    pub fn take(&self, token: &str) -> Vec<Flash> {
        self.lock()
            .remove(token)
            .map(|p| p.items)
            .unwrap_or_default()
    }

    pub fn clear(&self, token: &str) {
        self.lock().remove(token);
    }

    /// Drop messages nobody collected within `max_age`, such as those left
    /// behind by sessions that expired without another dashboard view.
    pub fn prune_older_than(&self, max_age: Duration) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, p| p.touched.elapsed() < max_age);
        before - map.len()
    }
}

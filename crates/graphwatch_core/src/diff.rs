/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Set arithmetic over identity lists. Every comparison is keyed by `id`;
//! outputs are sorted by `id` so unfollow batches are reproducible.

use crate::snapshot_db::Snapshot;
use graphwatch_protocol::Identity;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Identities in `following` that are absent from `followers`.
pub fn non_followers(following: &[Identity], followers: &[Identity]) -> Vec<Identity> {
    difference(following, followers)
}

/// Identities present in `new` but not in `old`.
pub fn additions(old: &[Identity], new: &[Identity]) -> Vec<Identity> {
    difference(new, old)
}

/// Identities present in `old` but not in `new`.
pub fn removals(old: &[Identity], new: &[Identity]) -> Vec<Identity> {
    difference(old, new)
}

pub fn sorted_by_id(items: impl IntoIterator<Item = Identity>) -> Vec<Identity> {
    let map: BTreeMap<String, Identity> = items.into_iter().map(|i| (i.id.clone(), i)).collect();
    map.into_values().collect()
}

fn difference(left: &[Identity], right: &[Identity]) -> Vec<Identity> {
    let exclude: HashSet<&str> = right.iter().map(|i| i.id.as_str()).collect();
    sorted_by_id(left.iter().filter(|i| !exclude.contains(i.id.as_str())).cloned())
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SnapshotChanges {
    pub new_followers: Vec<Identity>,
    pub lost_followers: Vec<Identity>,
    pub new_following: Vec<Identity>,
    pub dropped_following: Vec<Identity>,
}

impl SnapshotChanges {
    pub fn between(old: &Snapshot, new: &Snapshot) -> Self {
        Self {
            new_followers: additions(&old.followers, &new.followers),
            lost_followers: removals(&old.followers, &new.followers),
            new_following: additions(&old.following, &new.following),
            dropped_following: removals(&old.following, &new.following),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_followers.is_empty()
            && self.lost_followers.is_empty()
            && self.new_following.is_empty()
            && self.dropped_following.is_empty()
    }
}

/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::snapshot_db::Snapshot;
use graphwatch_protocol::Identity;

pub const CSV_HEADER: &str = "list,id,handle,display_name";

/// Snapshot as CSV: followers rows first, then following rows.
pub fn snapshot_csv(snap: &Snapshot) -> String {
    let mut out = String::with_capacity(64 * (snap.followers.len() + snap.following.len() + 1));
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    write_rows(&mut out, "followers", &snap.followers);
    write_rows(&mut out, "following", &snap.following);
    out
}

pub fn export_filename(snap: &Snapshot) -> String {
    let owner: String = snap
        .owner
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect();
    format!("snapshot_{owner}_{}.csv", snap.date.format("%Y-%m-%d"))
}

fn write_rows(out: &mut String, list: &str, rows: &[Identity]) {
    for who in rows {
        let fields = [list, who.id.as_str(), who.handle.as_str(), who.display_name.as_str()];
        for (i, f) in fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_field(out, f);
        }
        out.push_str("\r\n");
    }
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

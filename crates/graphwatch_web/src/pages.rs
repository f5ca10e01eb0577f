/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - GRAPHWATCH Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::flash::Flash;
use graphwatch_core::diff::SnapshotChanges;
use graphwatch_core::snapshot_db::SnapshotSummary;
use graphwatch_protocol::{Identity, JobState, JobStatus};
use std::fmt::Write as _;

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
body {{ font-family: sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; }}
section {{ border: 1px solid #ddd; border-radius: 6px; padding: 1rem; margin-bottom: 1rem; }}
.flash {{ padding: .5rem 1rem; border-radius: 4px; margin-bottom: .5rem; }}
.success {{ background: #e6f4ea; }} .info {{ background: #e8f0fe; }}
.warning {{ background: #fef7e0; }} .danger {{ background: #fce8e6; }}
table {{ border-collapse: collapse; width: 100%; }}
td, th {{ border-bottom: 1px solid #eee; padding: .25rem .5rem; text-align: left; }}
</style>
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn login_page(error: Option<&str>) -> String {
    let mut body = String::from("<h1>GraphWatch</h1>\n");
    if let Some(msg) = error {
        let _ = writeln!(body, r#"<div class="flash danger">{}</div>"#, escape(msg));
    }
    body.push_str(
        r#"<form method="post" action="/login">
<label>Username <input name="username" autocomplete="username"></label>
<label>Password <input name="password" type="password" autocomplete="current-password"></label>
<button type="submit">Log in</button>
</form>
"#,
    );
    layout("GraphWatch - login", &body)
}

pub struct DashboardView {
    pub handle: String,
    pub flashes: Vec<Flash>,
    pub own: Option<SnapshotSummary>,
    pub changes: Option<SnapshotChanges>,
    pub others: Vec<SnapshotSummary>,
    pub job: JobStatus,
}

pub fn dashboard_page(view: &DashboardView) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        r#"<h1>Welcome, {}</h1><p><a href="/logout">Log out</a></p>"#,
        escape(&view.handle)
    );
    for f in &view.flashes {
        let _ = writeln!(
            body,
            r#"<div class="flash {}">{}</div>"#,
            f.kind.css_class(),
            escape(&f.text)
        );
    }

    body.push_str("<section><h2>Your account</h2>\n");
    match &view.own {
        Some(s) => {
            let _ = writeln!(
                body,
                "<p>Followers: {} &middot; Following: {} &middot; Last updated: {}</p>",
                s.followers,
                s.following,
                escape(&s.date)
            );
        }
        None => body.push_str("<p>Followers: N/A &middot; Following: N/A &middot; Last updated: Never</p>\n"),
    }
    if let Some(changes) = &view.changes {
        body.push_str(&changes_block(changes));
    }
    body.push_str(
        r#"<form method="post" action="/export_latest"><button type="submit">Export latest snapshot (CSV)</button></form>
</section>
"#,
    );

    body.push_str(&job_block(&view.job));

    body.push_str(
        r#"<section><h2>Check a relationship</h2>
<form method="post" action="/check_status">
<input name="target_username" placeholder="username">
<select name="check_type"><option value="follower">follows me</option><option value="following">I follow</option></select>
<button type="submit">Check</button>
</form></section>
<section><h2>Check across accounts</h2>
<form method="post" action="/check_multi_account_status">
<input name="target_username" placeholder="target username">
<input name="my_accounts" placeholder="account1, account2">
<input name="password" type="password" placeholder="shared password">
<button type="submit">Check</button>
</form></section>
<section><h2>Unfollow non-followers</h2>
<form method="post" action="/unfollow_non_followers">
<input name="unfollow_count" type="number" min="1" value="10">
<button type="submit">Unfollow</button>
</form></section>
<section><h2>Follow users</h2>
<form method="post" action="/follow_users">
<textarea name="usernames" rows="4" placeholder="one per line or comma separated"></textarea>
<button type="submit">Follow</button>
</form></section>
"#,
    );

    body.push_str("<section><h2>Processed accounts</h2>\n");
    if view.others.is_empty() {
        body.push_str("<p>No accounts processed yet.</p>\n");
    } else {
        body.push_str("<table><tr><th>Account</th><th>Followers</th><th>Following</th><th>Date</th></tr>\n");
        for s in &view.others {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&s.owner),
                s.followers,
                s.following,
                escape(&s.date)
            );
        }
        body.push_str("</table>\n");
    }
    body.push_str("</section>\n");

    layout("GraphWatch - dashboard", &body)
}

fn changes_block(changes: &SnapshotChanges) -> String {
    if changes.is_empty() {
        return "<p>No changes since the previous snapshot.</p>\n".to_string();
    }
    let mut out = String::from("<h3>Since the previous snapshot</h3>\n<ul>\n");
    for (label, list) in [
        ("New followers", &changes.new_followers),
        ("Lost followers", &changes.lost_followers),
        ("Newly followed", &changes.new_following),
        ("No longer followed", &changes.dropped_following),
    ] {
        if list.is_empty() {
            continue;
        }
        let _ = writeln!(out, "<li>{label} ({}): {}</li>", list.len(), handles(list));
    }
    out.push_str("</ul>\n");
    out
}

fn handles(list: &[Identity]) -> String {
    list.iter()
        .map(|i| escape(&i.handle))
        .collect::<Vec<_>>()
        .join(", ")
}

fn job_block(job: &JobStatus) -> String {
    let state = match job.state {
        JobState::NotStarted => "not started",
        JobState::Running => "running",
        JobState::Done => "done",
        JobState::Failed => "failed",
    };
    let mut out = String::from("<section><h2>Link harvest</h2>\n");
    let _ = writeln!(out, "<p>Last run: {state}</p>");
    if let Some(r) = &job.report {
        let _ = writeln!(
            out,
            "<p>Pending {} &middot; processed {} &middot; failed {} &middot; invalid links {}</p>",
            r.pending, r.processed, r.failed, r.invalid_links
        );
        if r.auth_failures > 0 {
            out.push_str(
                r#"<p class="flash warning">The remote service rejected the session during the last run. Log in again before the next one.</p>
"#,
            );
        }
    }
    if let Some(e) = &job.error {
        let _ = writeln!(out, r#"<p class="flash danger">{}</p>"#, escape(e));
    }
    out.push_str(
        r#"<form method="post" action="/links">
<textarea name="links" rows="3" placeholder="profile links, one per line"></textarea>
<button type="submit">Add links</button>
</form>
<form method="post" action="/run_automation"><button type="submit">Run harvest</button></form>
</section>
"#,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::FlashKind;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b>"x" & 'y'</b>"#), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn dashboard_escapes_user_content() {
        let view = DashboardView {
            handle: "<alice>".to_string(),
            flashes: vec![Flash {
                kind: FlashKind::Error,
                text: "user '<script>' not found".to_string(),
            }],
            own: None,
            changes: None,
            others: vec![SnapshotSummary {
                owner: "bob&co".to_string(),
                date: "2024-01-01".to_string(),
                followers: 3,
                following: 4,
            }],
            job: JobStatus::not_started(),
        };
        let html = dashboard_page(&view);
        assert!(html.contains("Welcome, &lt;alice&gt;"));
        assert!(html.contains("user &#39;&lt;script&gt;&#39; not found"));
        assert!(html.contains("<td>bob&amp;co</td>"));
        assert!(html.contains("Last updated: Never"));
        assert!(!html.contains("<script>"));
    }
}

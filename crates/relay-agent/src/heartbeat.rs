//! Heartbeat prompt builder (invariant 8): decides whether an agent's
//! heartbeat job has real work to report this tick.
//!
//! `HEARTBEAT.md` holding only headings, HTML comments, and blank lines is
//! read as "nothing to report" — the scheduler reschedules the job without
//! firing it. Anything else is returned as the synthetic message content.

use std::path::Path;

use tracing::warn;

/// Reads `<workspace>/HEARTBEAT.md` and returns its content if it carries
/// real work, `None` if the file is missing or contains only headings,
/// HTML comments, and blank lines.
pub fn build_heartbeat_prompt(workspace: &Path) -> Option<String> {
    let path = workspace.join("HEARTBEAT.md");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to read HEARTBEAT.md");
            }
            return None;
        }
    };

    if has_no_real_work(&content) {
        None
    } else {
        Some(content)
    }
}

fn has_no_real_work(content: &str) -> bool {
    strip_html_comments(content)
        .lines()
        .all(|line| line.trim().is_empty() || line.trim().starts_with('#'))
}

/// Removes every `<!-- ... -->` span, including ones spanning multiple
/// lines. An unterminated comment consumes the rest of the file, matching
/// how a markdown renderer would treat it.
fn strip_html_comments(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

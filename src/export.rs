//! Markdown export of annotated items ("knowledge base").
//!
//! Rendering is a pure function over the noted items so the layout is
//! testable without a database; the CLI decides where the text goes.

use chrono::{DateTime, Utc};

use crate::storage::NotedItem;

/// Render every noted item into one markdown document.
///
/// Items are expected in the order they should appear (the storage query
/// returns them most recent first). Returns `None` when there is nothing to
/// export, so callers can report that instead of writing an empty file.
pub fn render_notes(items: &[NotedItem], exported_at: DateTime<Utc>) -> Option<String> {
    if items.is_empty() {
        return None;
    }

    let mut out = String::from("# Knowledge Base\n\n");
    out.push_str(&format!(
        "> Exported on {}\n\n---\n\n",
        exported_at.format("%B %-d, %Y at %H:%M")
    ));

    for item in items {
        out.push_str(&format!("## {}\n\n", item.title));
        out.push_str(&format!("- **Source:** {}\n", item.source_name));
        out.push_str(&format!("- **Date:** {}\n", format_date(item.published)));
        out.push_str(&format!("- **URL:** {}\n", item.url));
        if item.to_study {
            out.push_str("- **Status:** To Study\n");
        }
        out.push_str(&format!("\n### Notes\n\n{}\n\n---\n\n", item.notes));
    }

    Some(out)
}

fn format_date(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

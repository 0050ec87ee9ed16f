//! Stamp board and leaderboard rendering.
//!
//! Pure markup builders; no network access. The collected-stamp list passed
//! in is the single source of truth for obtained state, so callers re-render
//! from a fresh list after every award or poll. All backend- and
//! user-controlled text is escaped before insertion.

use chrono::DateTime;

use crate::api::models::{RankingEntry, StampRecord};
use crate::spots::SpotCatalog;

/// Escape text for insertion into markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Epoch seconds to a display date, or a placeholder when unknown.
pub fn format_collected_at(epoch: Option<i64>) -> String {
    epoch
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Render the stamp board: every catalog spot, obtained ones highlighted.
///
/// An empty collected list renders the explicit empty state instead of a
/// board of placeholders.
pub fn render_stamp_board(catalog: &SpotCatalog, collected: &[StampRecord]) -> String {
    if collected.is_empty() {
        return r#"<p class="empty-message">No stamps collected yet</p>"#.to_string();
    }

    let mut html = String::from(r#"<div class="stamp-board">"#);
    for spot in catalog.spots() {
        let obtained = collected.iter().find(|s| s.stamp_id == spot.id);
        let class = if obtained.is_some() {
            "stamp obtained"
        } else {
            "stamp not-obtained"
        };
        html.push_str(&format!(
            r#"<div class="stamp-item"><img src="{}" alt="{}" class="{}">"#,
            escape_html(&spot.image_ref),
            escape_html(&spot.display_name),
            class,
        ));
        if let Some(stamp) = obtained {
            let name = if stamp.name.is_empty() {
                &stamp.stamp_id
            } else {
                &stamp.name
            };
            html.push_str(&format!(
                r#"<div class="stamp-info"><strong>{}</strong><small>{}</small></div>"#,
                escape_html(name),
                escape_html(&format_collected_at(stamp.collected_at)),
            ));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    html
}

/// Collection progress as `percent% (obtained/total)`.
pub fn render_progress(collected: usize, total: usize) -> String {
    let percent = if total > 0 {
        ((collected as f64 / total as f64) * 100.0).round() as u32
    } else {
        0
    };
    format!("{}% ({}/{})", percent, collected, total)
}

/// Render a friends leaderboard, with an explicit empty state.
pub fn render_rankings(entries: &[RankingEntry]) -> String {
    if entries.is_empty() {
        return concat!(
            r#"<div class="empty-state"><p>No ranking data yet</p>"#,
            r#"<p class="text-muted">Collect stamps to join the leaderboard</p></div>"#,
        )
        .to_string();
    }

    let mut html = String::from(r#"<ol class="ranking-list">"#);
    for (index, entry) in entries.iter().enumerate() {
        let rank = entry.rank.unwrap_or(index as u32 + 1);
        let mut classes = String::from("ranking-item");
        if rank <= 3 {
            classes.push_str(" top-three");
        }
        if entry.is_self {
            classes.push_str(" self");
        }
        let name = entry.display_name.as_deref().unwrap_or("Unknown");
        let self_marker = if entry.is_self { " (you)" } else { "" };
        html.push_str(&format!(
            r#"<li class="{}"><span class="rank">{}</span><span class="name">{}{}</span><span class="count">{}</span></li>"#,
            classes,
            rank,
            escape_html(name),
            self_marker,
            entry.stamp_count,
        ));
    }
    html.push_str("</ol>");
    html
}

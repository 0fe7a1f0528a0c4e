use colored::{ColoredString, Colorize};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::core::overrides::ConfigEntry;
use crate::models::score::{AnomalyScore, Status};
use crate::models::stream::Livestream;

fn status_label(status: Status) -> ColoredString {
    match status {
        Status::Trending => status.as_str().red().bold(),
        Status::Normal => status.as_str().green(),
        Status::InsufficientData => status.as_str().yellow(),
        Status::Inactive => status.as_str().dimmed(),
        Status::Error => status.as_str().magenta(),
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h)));
    table
}

/// Ranking table, one row per stream in rank order.
pub fn format_ranking(scores: &[AnomalyScore]) -> String {
    if scores.is_empty() {
        return "No live streams.".to_string();
    }
    let mut table = new_table(&["#", "Stream", "Channel", "Score", "Status", "Viewers", "Raw"]);
    for (i, s) in scores.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(s.name.as_deref().unwrap_or(&s.external_id)),
            Cell::new(s.channel.as_deref().unwrap_or("-")),
            Cell::new(format!("{:.1}", s.score)).set_alignment(CellAlignment::Right),
            Cell::new(status_label(s.status)),
            Cell::new(
                s.current_viewcount
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".into()),
            )
            .set_alignment(CellAlignment::Right),
            Cell::new(
                s.raw_score
                    .map(|v| format!("{:.3}", v))
                    .unwrap_or_else(|| "-".into()),
            )
            .set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

/// Detail view of one score.
pub fn format_score(s: &AnomalyScore) -> String {
    let title = s.name.as_deref().unwrap_or(&s.external_id);
    let mut out = format!(
        "{} [{}]\n  score: {:.2} ({})\n  status: {}\n",
        title.bold(),
        s.external_id,
        s.score,
        s.algorithm,
        status_label(s.status)
    );
    if let Some(v) = s.current_viewcount {
        out.push_str(&format!("  viewers: {}\n", v));
    }
    if let (Some(recent), Some(baseline)) = (s.recent_mean, s.baseline_mean) {
        out.push_str(&format!(
            "  recent mean: {:.1}, baseline mean: {:.1}\n",
            recent, baseline
        ));
    }
    if let Some(reason) = s.reason() {
        out.push_str(&format!("  reason: {}\n", reason));
    }
    out.trim_end().to_string()
}

pub fn format_streams(streams: &[Livestream]) -> String {
    if streams.is_empty() {
        return "No streams tracked.".to_string();
    }
    let mut table = new_table(&["ID", "Video", "Name", "Channel", "Live"]);
    for s in streams {
        let live = if s.is_live { "yes".green() } else { "no".dimmed() };
        table.add_row(vec![
            Cell::new(s.id),
            Cell::new(&s.external_id),
            Cell::new(&s.name),
            Cell::new(&s.channel),
            Cell::new(live),
        ]);
    }
    table.to_string()
}

pub fn format_config_entries(entries: &[ConfigEntry]) -> String {
    let mut table = new_table(&["Key", "Type", "Value", ""]);
    for e in entries {
        let marker = if e.is_default { "" } else { "override" };
        table.add_row(vec![
            Cell::new(e.key),
            Cell::new(e.value_type),
            Cell::new(&e.value),
            Cell::new(marker.cyan()),
        ]);
    }
    table.to_string()
}

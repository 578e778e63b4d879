//! Text table builder for CLI output.

use crate::model::ProvisionEntity;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

const HEADERS: [&str; 6] = ["ID", "NAME", "TYPE", "STATE", "WORKERS", "ERROR"];

fn row(e: &ProvisionEntity) -> [String; 6] {
    [
        e.id.clone(),
        e.display_name().to_string(),
        e.cluster_type.label().to_string(),
        e.state_label(),
        e.workers_label(),
        e.error.clone().unwrap_or_default(),
    ]
}

/// Build an aligned table of the snapshot, or a hint when nothing is provisioned.
pub(crate) fn build_text_summary(entities: &[ProvisionEntity]) -> TextSummary {
    if entities.is_empty() {
        return TextSummary {
            lines: vec!["No provisioning option set up.".to_string()],
        };
    }

    let rows: Vec<[String; 6]> = entities.iter().map(row).collect();
    let mut widths = HEADERS.map(|h| h.chars().count());
    for r in &rows {
        for (w, cell) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let fmt_line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(fmt_line(&HEADERS.map(String::from)));
    for r in &rows {
        lines.push(fmt_line(r));
    }
    TextSummary { lines }
}

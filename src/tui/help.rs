use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const KEYBINDS: &[(&str, &str)] = &[
    ("q / Ctrl-C", "Quit"),
    ("r", "Refresh now"),
    ("a", "Add engine"),
    ("e", "Edit selected"),
    ("s", "Start/stop selected"),
    ("d", "Remove selected"),
    ("↑/↓ j/k", "Navigate"),
    ("Enter", "Set up selected cluster type (no engines yet)"),
    ("tab", "Switch tabs"),
    ("?", "Show this help"),
];

const DIALOG_KEYS: &[(&str, &str)] = &[
    ("y / Enter", "Confirm"),
    ("n / Esc", "Cancel"),
    ("tab / ↑/↓", "Move between form fields"),
];

fn key_line(key: &str, what: &str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{key:<12}"), Style::default().fg(Color::Magenta)),
        Span::raw(what.to_string()),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let mut lines = vec![Line::from("Keybinds:")];
    lines.extend(KEYBINDS.iter().map(|(k, w)| key_line(k, w)));
    lines.push(Line::from(""));
    lines.push(Line::from("Dialogs and forms:"));
    lines.extend(DIALOG_KEYS.iter().map(|(k, w)| key_line(k, w)));
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("Logs: "),
        Span::styled(
            crate::logging::log_file_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "disabled".into()),
            Style::default().fg(Color::Cyan),
        ),
    ]));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}

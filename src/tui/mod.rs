mod form;
mod help;
mod state;

use crate::backend::ProvisionBackend;
use crate::model::{ClusterType, MutationPhase, PageConfig, PageEvent, Severity};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use form::{FormState, FormSubmit};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Terminal,
};
use state::{Dialog, Screen, UiState};
use std::sync::Arc;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const TAB_COUNT: usize = 2;

pub async fn run(cfg: PageConfig, backend: Arc<dyn ProvisionBackend>) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PageEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let cluster_types = cfg.cluster_types.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(cluster_types, event_rx, cmd_tx));

    let res = orchestrator::run_controller(&cfg, backend, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    cluster_types: Vec<ClusterType>,
    mut event_rx: UnboundedReceiver<PageEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; the controller talks to it through events.
    let mut state = UiState::new(cluster_types);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k.code, k.modifiers, &cmd_tx) {
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Apply one key press. Returns true when the UI should exit.
fn handle_key(
    state: &mut UiState,
    code: KeyCode,
    modifiers: KeyModifiers,
    cmd_tx: &UnboundedSender<UiCommand>,
) -> bool {
    if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
        let _ = cmd_tx.send(UiCommand::Quit);
        return true;
    }
    if state.dialog.is_open() {
        handle_dialog_key(state, code, cmd_tx);
        return false;
    }

    match code {
        KeyCode::Char('q') => {
            let _ = cmd_tx.send(UiCommand::Quit);
            return true;
        }
        KeyCode::Tab => state.tab = (state.tab + 1) % TAB_COUNT,
        KeyCode::Char('?') => state.tab = 1,
        KeyCode::Char('r') => {
            let _ = cmd_tx.send(UiCommand::Refresh);
        }
        KeyCode::Up | KeyCode::Char('k') if state.tab == 0 => state.select_prev(),
        KeyCode::Down | KeyCode::Char('j') if state.tab == 0 => state.select_next(),
        KeyCode::Enter if state.tab == 0 => {
            if let Screen::InitialSetup { .. } = state.screen() {
                if let Some(ct) = state.cluster_types.get(state.setup_selected) {
                    let _ = cmd_tx.send(UiCommand::SelectClusterType(*ct));
                }
            }
        }
        KeyCode::Char('a') if state.tab == 0 => {
            let _ = cmd_tx.send(UiCommand::OpenCreate);
        }
        KeyCode::Char(c @ ('e' | 'd' | 's')) if state.tab == 0 => {
            if state.mutation == MutationPhase::Submitting {
                state.set_info("A change is still being submitted", Severity::Warning);
                return false;
            }
            let Some(entity) = state.selected_entity().cloned() else {
                state.set_info("No engine selected", Severity::Info);
                return false;
            };
            let entity = Box::new(entity);
            let cmd = match c {
                'e' => UiCommand::OpenEdit(entity),
                'd' => UiCommand::RequestRemove(entity),
                _ => {
                    let desired = entity.desired_state.toggled();
                    UiCommand::ChangeState { entity, desired }
                }
            };
            let _ = cmd_tx.send(cmd);
        }
        _ => {}
    }
    false
}

fn handle_dialog_key(state: &mut UiState, code: KeyCode, cmd_tx: &UnboundedSender<UiCommand>) {
    match std::mem::take(&mut state.dialog) {
        Dialog::None => {}
        Dialog::Confirm { dialog, action } => match code {
            KeyCode::Char('y') | KeyCode::Enter => {
                let _ = cmd_tx.send(UiCommand::Confirm(action));
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                let _ = cmd_tx.send(UiCommand::CancelConfirm);
            }
            _ => state.dialog = Dialog::Confirm { dialog, action },
        },
        Dialog::PickClusterType { selected } => {
            let last = state.cluster_types.len().saturating_sub(1);
            match code {
                KeyCode::Up | KeyCode::Char('k') => {
                    state.dialog = Dialog::PickClusterType {
                        selected: selected.saturating_sub(1),
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    state.dialog = Dialog::PickClusterType {
                        selected: (selected + 1).min(last),
                    }
                }
                KeyCode::Enter => {
                    if let Some(ct) = state.cluster_types.get(selected) {
                        let _ = cmd_tx.send(UiCommand::SelectClusterType(*ct));
                    }
                }
                KeyCode::Esc => {}
                _ => state.dialog = Dialog::PickClusterType { selected },
            }
        }
        Dialog::Form(mut form) => match code {
            KeyCode::Esc => {}
            KeyCode::Enter => match form.submit() {
                Ok(FormSubmit::Create(data)) => {
                    let _ = cmd_tx.send(UiCommand::Create(data));
                }
                Ok(FormSubmit::Edit(data)) => {
                    let _ = cmd_tx.send(UiCommand::SaveEdit(data));
                }
                Err(e) => {
                    form.error = Some(e);
                    state.dialog = Dialog::Form(form);
                }
            },
            other => {
                match other {
                    KeyCode::Tab | KeyCode::Down => form.focused = form.focused.next(),
                    KeyCode::BackTab | KeyCode::Up => form.focused = form.focused.prev(),
                    KeyCode::Backspace => form.backspace(),
                    KeyCode::Char(c) => form.input(c),
                    _ => {}
                }
                state.dialog = Dialog::Form(form);
            }
        },
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Gray,
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Engines"), Line::from("Help")])
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Elastic Engines"),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => match state.screen() {
            Screen::List => draw_engines(chunks[1], f, state),
            Screen::InitialSetup { loading } => draw_setup(chunks[1], f, state, loading),
        },
        _ => help::draw_help(chunks[1], f),
    }
    draw_status(chunks[2], f, state);

    match &state.dialog {
        Dialog::None => {}
        Dialog::Confirm { dialog, .. } => draw_confirm(area, f, dialog),
        Dialog::PickClusterType { selected } => draw_picker(area, f, state, *selected),
        Dialog::Form(form) => draw_form(area, f, form),
    }
}

fn draw_engines(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let header_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let header = Row::new(["NAME", "TYPE", "STATE", "WORKERS", "ERROR"]).style(header_style);
    let rows = state.provisions.iter().map(|e| {
        let error_style = Style::default().fg(Color::Red);
        Row::new(vec![
            Span::raw(e.display_name().to_string()),
            Span::raw(e.cluster_type.label()),
            Span::raw(e.state_label()),
            Span::raw(e.workers_label()),
            Span::styled(e.error.clone().unwrap_or_default(), error_style),
        ])
    });
    let widths = [
        Constraint::Percentage(25),
        Constraint::Length(12),
        Constraint::Length(22),
        Constraint::Length(18),
        Constraint::Min(10),
    ];
    let highlight = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Engines ({})", state.provisions.len())),
        )
        .row_highlight_style(highlight)
        .highlight_symbol("> ");

    let mut table_state = TableState::default().with_selected(Some(state.selected));
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_setup(area: Rect, f: &mut ratatui::Frame, state: &UiState, loading: bool) {
    let mut lines = Vec::new();
    if loading {
        let loading_style = Style::default().fg(Color::Yellow);
        lines.push(Line::styled("Loading provisions…", loading_style));
        lines.push(Line::from(""));
    }
    let hint = "No provisioning option set up. Select one to get started.";
    lines.push(Line::from(hint));
    lines.push(Line::from(""));
    for (i, ct) in state.cluster_types.iter().enumerate() {
        let marker = if i == state.setup_selected { "> " } else { "  " };
        let style = if i == state.setup_selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!("{marker}{ct}"), style)));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Enter", Style::default().fg(Color::Magenta)),
        Span::raw(": set up selected type"),
    ]));

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Setup"));
    f.render_widget(p, area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let dim = Style::default().fg(Color::DarkGray);
    let info_style = Style::default().fg(severity_color(state.info_severity));
    let mut spans = vec![Span::styled(state.info.clone(), info_style)];
    if let Some(at) = &state.last_refreshed {
        spans.push(Span::styled(format!("  refreshed {at}"), dim));
    }
    if state.view_state.is_in_progress {
        spans.push(Span::styled("  refreshing…", dim));
    }
    if let Some(e) = &state.view_state.error {
        let error_style = Style::default().fg(Color::Red);
        spans.push(Span::styled(format!("  load failed: {e}"), error_style));
    }
    if state.mutation == MutationPhase::Submitting {
        let busy_style = Style::default().fg(Color::Yellow);
        spans.push(Span::styled("  Submitting…", busy_style));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Rect of `percent_x` width and `height` rows centred in `r`.
fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height.min(r.height)),
            Constraint::Min(0),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_confirm(area: Rect, f: &mut ratatui::Frame, dialog: &crate::model::ConfirmDialog) {
    let cancel = dialog.cancel_label.as_deref().unwrap_or("Cancel");
    let mut lines: Vec<Line> = dialog.body.iter().map(|l| Line::from(l.as_str())).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Magenta)),
        Span::raw(format!(": {}   ", dialog.confirm_label)),
        Span::styled("n", Style::default().fg(Color::Magenta)),
        Span::raw(format!(": {cancel}")),
    ]));

    let rect = centered_rect(60, lines.len() as u16 + 4, area);
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(dialog.title.as_str()),
        );
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

fn draw_picker(area: Rect, f: &mut ratatui::Frame, state: &UiState, selected: usize) {
    let lines: Vec<Line> = state
        .cluster_types
        .iter()
        .enumerate()
        .map(|(i, ct)| {
            if i == selected {
                Line::styled(format!("> {ct}"), Style::default().fg(Color::Yellow))
            } else {
                Line::from(format!("  {ct}"))
            }
        })
        .collect();

    let rect = centered_rect(40, lines.len() as u16 + 2, area);
    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Select cluster type"),
    );
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

fn draw_form(area: Rect, f: &mut ratatui::Frame, form: &FormState) {
    let mut lines = Vec::new();
    for field in form::FormField::ALL {
        let focused = field == form.focused;
        let label_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let cursor = if focused { "_" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<13}", field.label()), label_style),
            Span::raw(format!("{}{cursor}", form.value(field))),
        ]));
    }
    lines.push(Line::from(""));
    if let Some(e) = &form.error {
        let error_style = Style::default().fg(Color::Red);
        lines.push(Line::styled(e.clone(), error_style));
    }
    lines.push(Line::from(vec![
        Span::styled("Enter", Style::default().fg(Color::Magenta)),
        Span::raw(": save   "),
        Span::styled("Esc", Style::default().fg(Color::Magenta)),
        Span::raw(": cancel"),
    ]));

    let rect = centered_rect(50, lines.len() as u16 + 2, area);
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(form.title()));
    f.render_widget(Clear, rect);
    f.render_widget(p, rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::entity;
    use crate::model::{DesiredState, PendingAction};
    use crate::orchestrator::remove_dialog;

    fn loaded_state() -> UiState {
        let mut s = UiState::new(vec![ClusterType::Yarn, ClusterType::Ec2]);
        s.apply_event(PageEvent::LoadFinished(Ok(vec![
            entity("a", DesiredState::Running),
            entity("b", DesiredState::Stopped),
        ])));
        s
    }

    fn press(s: &mut UiState, code: KeyCode, tx: &UnboundedSender<UiCommand>) -> bool {
        handle_key(s, code, KeyModifiers::NONE, tx)
    }

    #[test]
    fn quit_keys() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = loaded_state();
        assert!(press(&mut s, KeyCode::Char('q'), &tx));
        assert!(matches!(rx.try_recv(), Ok(UiCommand::Quit)));
        let ctrl_c = handle_key(&mut s, KeyCode::Char('c'), KeyModifiers::CONTROL, &tx);
        assert!(ctrl_c);
    }

    #[test]
    fn refresh_key_leaves_status_to_the_controller() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = loaded_state();
        press(&mut s, KeyCode::Char('r'), &tx);
        assert!(matches!(rx.try_recv(), Ok(UiCommand::Refresh)));
        assert!(s.info.is_empty());
    }

    #[test]
    fn toggle_state_targets_selected_engine() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = loaded_state();
        press(&mut s, KeyCode::Down, &tx);
        press(&mut s, KeyCode::Char('s'), &tx);
        match rx.try_recv() {
            Ok(UiCommand::ChangeState { entity, desired }) => {
                assert_eq!(entity.id, "b");
                assert_eq!(desired, DesiredState::Running);
            }
            other => panic!("unexpected {other:?}"),
        }

        s.apply_event(PageEvent::Mutation(MutationPhase::Submitting));
        press(&mut s, KeyCode::Char('d'), &tx);
        assert!(rx.try_recv().is_err());
        assert_eq!(s.info_severity, Severity::Warning);
    }

    #[test]
    fn confirm_dialog_consumes_keys() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = loaded_state();
        let action = PendingAction::Remove { id: "a".into() };
        s.apply_event(PageEvent::Confirm {
            dialog: remove_dialog(),
            action: action.clone(),
        });

        // 'q' inside a dialog does not quit.
        assert!(!press(&mut s, KeyCode::Char('q'), &tx));
        assert!(s.dialog.is_open());

        press(&mut s, KeyCode::Enter, &tx);
        assert!(matches!(rx.try_recv(), Ok(UiCommand::Confirm(a)) if a == action));
        assert!(!s.dialog.is_open());

        s.apply_event(PageEvent::Confirm {
            dialog: remove_dialog(),
            action,
        });
        press(&mut s, KeyCode::Esc, &tx);
        assert!(matches!(rx.try_recv(), Ok(UiCommand::CancelConfirm)));
    }

    #[test]
    fn setup_enter_selects_cluster_type() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = UiState::new(vec![ClusterType::Yarn, ClusterType::Ec2]);
        s.apply_event(PageEvent::LoadFinished(Ok(vec![])));
        press(&mut s, KeyCode::Down, &tx);
        press(&mut s, KeyCode::Enter, &tx);
        assert!(matches!(
            rx.try_recv(),
            Ok(UiCommand::SelectClusterType(ClusterType::Ec2))
        ));
    }

    #[test]
    fn form_validates_before_sending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = loaded_state();
        s.apply_event(PageEvent::OpenCreate {
            cluster_type: Some(ClusterType::Yarn),
        });
        press(&mut s, KeyCode::Tab, &tx);
        press(&mut s, KeyCode::Backspace, &tx);
        press(&mut s, KeyCode::Enter, &tx);
        assert!(rx.try_recv().is_err());
        assert!(matches!(&s.dialog, Dialog::Form(f) if f.error.is_some()));

        press(&mut s, KeyCode::Char('3'), &tx);
        press(&mut s, KeyCode::Enter, &tx);
        match rx.try_recv() {
            Ok(UiCommand::Create(data)) => assert_eq!(data.dynamic_config.container_count, 3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.dialog.is_open());
    }
}

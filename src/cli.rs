use crate::backend::{HttpBackend, ProvisionBackend};
use crate::model::{
    local_clock, ClusterType, ConfirmDialog, DesiredState, PageConfig, PageEvent, PendingAction,
    Severity,
};
use crate::orchestrator::{PageSession, PROVISION_POLL_INTERVAL};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "provisioning-cli",
    version,
    about = "Manage provisioned elastic engines, with an optional TUI"
)]
pub struct Cli {
    /// Base URL of the provisioning REST API
    #[arg(long, default_value = "http://localhost:9047/apiv2")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "PROVISIONING_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Delay between the end of one refresh and the start of the next
    #[arg(long, default_value = "3s")]
    pub poll_interval: humantime::Duration,

    /// Per-request timeout
    #[arg(long, default_value = "10s")]
    pub request_timeout: humantime::Duration,

    /// Cluster types offered when adding an engine
    #[arg(long, value_enum, value_delimiter = ',', default_value = "yarn")]
    pub cluster_types: Vec<ClusterType>,

    /// Print the engines as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print the engines as a text table and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// With --text, keep refreshing until interrupted
    #[arg(long, requires = "text")]
    pub watch: bool,

    /// Only show the engine with this id (--json/--text)
    #[arg(long)]
    pub id: Option<String>,

    /// Remove the engine with this id
    #[arg(long, value_name = "ID", conflicts_with_all = ["start", "stop"])]
    pub remove: Option<String>,

    /// Set the engine with this id to RUNNING
    #[arg(long, value_name = "ID", conflicts_with = "stop")]
    pub start: Option<String>,

    /// Set the engine with this id to STOPPED
    #[arg(long, value_name = "ID")]
    pub stop: Option<String>,

    /// Answer yes to confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl Cli {
    fn is_interactive(&self) -> bool {
        !self.json && !self.text && self.mutation().is_none()
    }

    fn mutation(&self) -> Option<Mutation<'_>> {
        if let Some(id) = self.remove.as_deref() {
            return Some(Mutation::Remove(id));
        }
        if let Some(id) = self.start.as_deref() {
            return Some(Mutation::SetState(id, DesiredState::Running));
        }
        self.stop
            .as_deref()
            .map(|id| Mutation::SetState(id, DesiredState::Stopped))
    }
}

#[derive(Debug, Clone, Copy)]
enum Mutation<'a> {
    Remove(&'a str),
    SetState(&'a str, DesiredState),
}

/// Build a `PageConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> PageConfig {
    let poll_interval = match Duration::from(args.poll_interval) {
        d if d.is_zero() => PROVISION_POLL_INTERVAL,
        d => d,
    };
    let mut cluster_types: Vec<ClusterType> = Vec::with_capacity(args.cluster_types.len());
    for ct in &args.cluster_types {
        if !cluster_types.contains(ct) {
            cluster_types.push(*ct);
        }
    }
    PageConfig {
        base_url: args.base_url.clone(),
        poll_interval,
        request_timeout: Duration::from(args.request_timeout),
        cluster_types,
        token: args.token.clone(),
        user_agent: format!("provisioning-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

pub async fn run(args: Cli) -> Result<()> {
    crate::logging::init_logging(args.is_interactive())?;

    let cfg = build_config(&args);
    tracing::debug!(
        event = "config.loaded",
        config = %serde_json::to_string(&cfg).unwrap_or_default()
    );
    let backend: Arc<dyn ProvisionBackend> = Arc::new(HttpBackend::new(&cfg)?);

    if let Some(mutation) = args.mutation() {
        return run_mutation(&args, &cfg, backend, mutation).await;
    }

    if args.is_interactive() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg, backend).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(&args, &cfg, backend).await;
        }
    }

    if args.json {
        let entities = backend
            .load_entities(args.id.as_deref())
            .await
            .context("failed to load provisions")?;
        println!("{}", serde_json::to_string_pretty(&entities)?);
        return Ok(());
    }

    run_text(&args, &cfg, backend).await
}

async fn run_text(args: &Cli, cfg: &PageConfig, backend: Arc<dyn ProvisionBackend>) -> Result<()> {
    if !args.watch {
        let entities = backend
            .load_entities(args.id.as_deref())
            .await
            .context("failed to load provisions")?;
        for line in crate::text_summary::build_text_summary(&entities).lines {
            println!("{line}");
        }
        return Ok(());
    }

    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PageEvent>();
    let session = PageSession::new(cfg, backend, args.id.clone(), event_tx);
    session.poller.start(true);

    loop {
        tokio::select! {
            ev = event_rx.recv() => match ev {
                Some(PageEvent::LoadFinished(Ok(entities))) => {
                    let _ = out_tx.send(OutputLine::Stdout(format!("== {} ==", local_clock())));
                    for line in crate::text_summary::build_text_summary(&entities).lines {
                        let _ = out_tx.send(OutputLine::Stdout(line));
                    }
                }
                Some(PageEvent::LoadFinished(Err(e))) => {
                    let _ = out_tx.send(OutputLine::Stderr(format!("Refresh failed: {e}")));
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.poller.teardown();
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

/// Ask on stdin; anything but y/yes declines.
async fn prompt_yes_no(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("read confirmation")?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Collect confirmation requests and the last error notification.
fn drain_events(
    rx: &mut mpsc::UnboundedReceiver<PageEvent>,
    pending: &mut Vec<(ConfirmDialog, PendingAction)>,
    failure: &mut Option<String>,
) {
    while let Ok(ev) = rx.try_recv() {
        match ev {
            PageEvent::Confirm { dialog, action } => pending.push((dialog, action)),
            PageEvent::Notify {
                message,
                severity: Severity::Error,
            } => *failure = Some(message),
            PageEvent::Notify { message, .. } => eprintln!("{message}"),
            _ => {}
        }
    }
}

async fn run_mutation(
    args: &Cli,
    cfg: &PageConfig,
    backend: Arc<dyn ProvisionBackend>,
    mutation: Mutation<'_>,
) -> Result<()> {
    let id = match mutation {
        Mutation::Remove(id) | Mutation::SetState(id, _) => id,
    };
    let entity = backend
        .load_entities(Some(id))
        .await
        .with_context(|| format!("failed to load engine {id}"))?
        .into_iter()
        .next()
        .with_context(|| format!("engine {id} not found"))?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<PageEvent>();
    let session = PageSession::new(cfg, backend, None, event_tx);
    match mutation {
        Mutation::Remove(_) => session.actions.handle_remove(&entity),
        Mutation::SetState(_, desired) => {
            session.actions.change_desired_state(&entity, desired).await
        }
    }

    let mut pending = Vec::new();
    let mut failure = None;
    drain_events(&mut event_rx, &mut pending, &mut failure);

    for (dialog, action) in std::mem::take(&mut pending) {
        eprintln!("{}", dialog.title);
        for line in &dialog.body {
            eprintln!("  {line}");
        }
        let confirmed = args.yes || prompt_yes_no(&format!("{}?", dialog.confirm_label)).await?;
        if !confirmed {
            session.actions.cancel();
            eprintln!("{}", dialog.cancel_label.as_deref().unwrap_or("Cancelled"));
            return Ok(());
        }
        session.actions.confirm(action).await;
    }
    drain_events(&mut event_rx, &mut pending, &mut failure);

    if let Some(message) = failure {
        anyhow::bail!(message);
    }
    eprintln!("Done: {}", entity.display_name());
    Ok(())
}

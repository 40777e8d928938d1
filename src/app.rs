use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::output::{self, table, OutputFormat};
use crate::report::{ReportStatus, ResultSet, RowPolicy, DEFAULT_DELIMITER};
use crate::service::http::{DEFAULT_BASE_URL, DEFAULT_POLL_PATH, DEFAULT_SUBMIT_PATH};
use crate::service::{HttpReportService, HttpServiceConfig, ReportService};
use crate::session::{
    ReportSession, SessionError, SessionHandle, SessionOptions, SessionSlot, SessionState,
    DEFAULT_POLL_INTERVAL,
};
use crate::view::{Navigation, ViewState, DEFAULT_PAGE_SIZE};

fn print_banner() {
    println!(
        "{} {}",
        "reportwatch".bold().white(),
        concat!("v", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_opt_value<'a>(v: &'a str, default: &'a str) -> &'a str {
    if v.trim().is_empty() {
        default
    } else {
        v
    }
}

fn status_message(state: &SessionState) -> String {
    match state.status {
        ReportStatus::Pending => "Report generation started".to_string(),
        ReportStatus::Running => format!(
            "Report is still generating... ({} {})",
            state.polls,
            if state.polls == 1 { "check" } else { "checks" }
        ),
        ReportStatus::Complete => "Report generation complete".to_string(),
        ReportStatus::Failed => "Report generation failed".to_string(),
    }
}

#[derive(Clone, Debug)]
struct RunConfig {
    service: HttpServiceConfig,
    session: SessionOptions,
    page_size: NonZeroUsize,
    start_page: i64,
    interactive: bool,
    no_color: bool,
    output: Option<String>,
    output_format: Option<OutputFormat>,
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let base_url = args
        .url
        .or(cfg.base_url)
        .map(|u| u.trim().to_string())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    reqwest::Url::parse(&base_url).map_err(|e| format!("invalid base url '{base_url}': {e}"))?;
    let submit_path = args
        .submit_path
        .or(cfg.submit_path)
        .unwrap_or_else(|| DEFAULT_SUBMIT_PATH.to_string());
    let poll_path = args
        .poll_path
        .or(cfg.poll_path)
        .unwrap_or_else(|| DEFAULT_POLL_PATH.to_string());

    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout, expected positive number of seconds".to_string());
    }
    let proxy = args
        .proxy
        .or(cfg.proxy)
        .filter(|p| !p.trim().is_empty());

    let delimiter = match args.delimiter.or(cfg.delimiter) {
        Some(raw) => validation::parse_delimiter(&raw)
            .map_err(|e| format!("invalid delimiter '{raw}': {e}"))?,
        None => DEFAULT_DELIMITER,
    };
    let row_policy = if args.strict_rows.or(cfg.strict_rows).unwrap_or(false) {
        RowPolicy::Strict
    } else {
        RowPolicy::Fill
    };

    let poll_interval = match args.interval.or(cfg.poll_interval_ms) {
        Some(0) => return Err("invalid interval, expected positive number of milliseconds".to_string()),
        Some(ms) => Duration::from_millis(ms),
        None => DEFAULT_POLL_INTERVAL,
    };
    let max_polls = args.max_polls.or(cfg.max_polls);
    if max_polls == Some(0) {
        return Err("invalid max-polls, expected positive integer".to_string());
    }

    let page_size = args.page_size.or(cfg.page_size).unwrap_or(DEFAULT_PAGE_SIZE);
    let page_size = NonZeroUsize::new(page_size)
        .ok_or_else(|| "invalid page-size, expected positive integer".to_string())?;
    let start_page = args.page.unwrap_or(1);
    let interactive = !args.no_interactive && cfg.interactive.unwrap_or(true);

    let output = args
        .output
        .or(cfg.output)
        .map(|p| config::expand_tilde_string(&p));
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => Some(
            OutputFormat::parse(&raw)
                .ok_or_else(|| format!("invalid output format '{raw}'"))?,
        ),
        None => None,
    };

    Ok(RunConfig {
        service: HttpServiceConfig {
            base_url,
            submit_path,
            poll_path,
            timeout_seconds: timeout,
            proxy,
            delimiter,
            row_policy,
        },
        session: SessionOptions {
            poll_interval,
            max_polls,
        },
        page_size,
        start_page,
        interactive,
        no_color,
        output,
        output_format,
    })
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "reportwatch=warn",
        1 => "reportwatch=info",
        2 => "reportwatch=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// Mirrors every published state onto the spinner until the session settles.
async fn watch_progress(
    handle: &SessionHandle,
    pb: &ProgressBar,
) -> Result<Arc<ResultSet>, SessionError> {
    let mut rx = handle.subscribe();
    loop {
        let state = rx.borrow_and_update().clone();
        pb.set_message(status_message(&state));
        if state.status.is_terminal() || rx.changed().await.is_err() {
            break;
        }
    }
    handle.wait().await
}

async fn export(run: &RunConfig, rows: &ResultSet) -> Result<(), String> {
    let Some(outfile_path) = run.output.as_ref() else {
        return Ok(());
    };
    let format = run
        .output_format
        .or_else(|| output::infer_format_from_path(outfile_path))
        .unwrap_or(OutputFormat::Text);
    let rendered = output::render(format, rows);
    tokio::fs::write(outfile_path, rendered)
        .await
        .map_err(|e| format!("failed to write output file '{outfile_path}': {e}"))?;
    tracing::info!(target: "reportwatch.app", path = %outfile_path, ?format, "report exported");
    format_kv_line("Saved", outfile_path);
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PagerCommand {
    Navigate(Navigation),
    Help,
    Quit,
    Unknown(String),
}

fn parse_pager_command(input: &str) -> PagerCommand {
    let cmd = input.trim().to_lowercase();
    match cmd.as_str() {
        "" | "n" | "next" => PagerCommand::Navigate(Navigation::Next),
        "p" | "prev" | "previous" => PagerCommand::Navigate(Navigation::Prev),
        "f" | "first" => PagerCommand::Navigate(Navigation::First),
        "l" | "last" => PagerCommand::Navigate(Navigation::Last),
        "q" | "quit" | "exit" => PagerCommand::Quit,
        "h" | "help" | "?" => PagerCommand::Help,
        other => match other.parse::<i64>() {
            Ok(page) => PagerCommand::Navigate(Navigation::Goto(page)),
            Err(_) => PagerCommand::Unknown(other.to_string()),
        },
    }
}

fn print_pager_help() {
    println!(
        "{}",
        "n/enter next · p prev · f first · l last · <number> go to page · q quit".dimmed()
    );
}

async fn run_pager(mut view: ViewState) -> Result<(), String> {
    print!("{}", table::render_page(&view));
    print_pager_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(format!("failed to read pager input: {e}")),
        };
        match parse_pager_command(&line) {
            PagerCommand::Navigate(nav) => {
                let next = view.apply(nav);
                if next.current_page() == view.current_page() && !matches!(nav, Navigation::Goto(_))
                {
                    println!("{}", "no more pages in that direction".dimmed());
                    continue;
                }
                view = next;
                println!();
                print!("{}", table::render_page(&view));
            }
            PagerCommand::Help => print_pager_help(),
            PagerCommand::Quit => break,
            PagerCommand::Unknown(cmd) => {
                println!("{} {}", "unknown command:".yellow(), cmd);
                print_pager_help();
            }
        }
    }
    Ok(())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let service: Arc<dyn ReportService> = Arc::new(
        HttpReportService::new(run.service.clone()).map_err(|e| e.to_string())?,
    );
    let session = ReportSession::new(service).with_options(run.session.clone());
    let options = session.options();

    format_kv_line("Service", &run.service.base_url);
    format_kv_line(
        "Interval",
        &format!("{}ms", options.poll_interval.as_millis()),
    );
    let max_polls = options
        .max_polls
        .map(|n| n.to_string())
        .unwrap_or_default();
    format_kv_line("Max polls", format_opt_value(&max_polls, "unbounded"));
    format_kv_line("Page size", &run.page_size.to_string());
    println!();

    let mut slot = SessionSlot::new();

    let now = Instant::now();
    let handle = slot
        .start(&session)
        .await
        .map_err(|e| format!("Failed to trigger report: {e}"))?;
    format_kv_line("Report ID", handle.id().as_str());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let outcome = tokio::select! {
        outcome = watch_progress(handle, &pb) => outcome,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            Err(SessionError::Cancelled)
        }
    };

    let rows = match outcome {
        Ok(rows) => {
            pb.finish_and_clear();
            println!(
                "{} {}",
                "::".bold().white(),
                "Report generation complete".bold().green()
            );
            rows
        }
        Err(SessionError::Cancelled) => {
            pb.finish_and_clear();
            slot.cancel();
            return Err("report cancelled".to_string());
        }
        Err(e) => {
            pb.finish_and_clear();
            return Err(format!("Failed to check report status: {e}"));
        }
    };

    let polls = slot.current().map(|h| h.snapshot().polls).unwrap_or_default();
    format_kv_line("Rows", &rows.len().to_string());
    format_kv_line("Checks", &polls.to_string());
    format_kv_line("Took", &format!("{}s", now.elapsed().as_secs()));
    export(&run, &rows).await?;
    println!();

    let view = ViewState::new(rows, run.page_size).goto(run.start_page);
    if run.interactive && std::io::stdin().is_terminal() {
        run_pager(view).await?;
    } else {
        print!("{}", table::render_page(&view));
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    if args.init_config {
        let path = user_config_path
            .or_else(config::default_config_path)
            .ok_or_else(|| "could not determine a config path".to_string())?;
        config::ensure_default_config_file(&path)?;
        format_kv_line("Config", &path.display().to_string());
        return Ok(());
    }

    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    tracing::debug!(
        target: "reportwatch.app",
        base_url = %run.service.base_url,
        interval_ms = run.session.poll_interval.as_millis() as u64,
        page_size = run.page_size.get(),
        "run configuration resolved"
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}

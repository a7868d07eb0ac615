use std::collections::BTreeMap;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::args::{CliArgs, Command};
use crate::cli::validation;
use crate::client::{self, ApiClient, ClientOptions, FetchOutcome};
use crate::config::{self, ConfigFile};
use crate::output::{self, OutputFormat};
use crate::resources::{self, Cadre};
use crate::search;
use crate::table::{FilterState, PageView, TableState};

fn print_banner(no_color: bool) {
    const BANNER: &str = r#"
        __      __      __           __
   ____ / /___  / /_____/ /__  _____/ /__
  / __ \/ / __ \/ __/ __  / _ \/ ___/ //_/
 / /_/ / / /_/ / /_/ /_/ /  __(__  ) ,<
/ .___/_/\____/\__/\__,_/\___/____/_/|_|
/_/        v0.4.2 - back office at the terminal
    "#;
    if no_color {
        println!("{}", BANNER);
    } else {
        println!("{}", BANNER.bold().cyan());
    }
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

/// Everything a single invocation needs, CLI flags layered over the
/// config file.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub client: ClientOptions,
    pub page: usize,
    pub page_size: usize,
    pub filters: FilterState,
    pub fetch_all: bool,
    pub live: bool,
    pub debounce: Duration,
    pub output: Option<String>,
    pub output_format: OutputFormat,
    pub no_color: bool,
    pub command: Command,
}

pub fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let base_url = args
        .base_url
        .or(cfg.base_url)
        .ok_or_else(|| "no base_url (set --base-url or base_url in the config)".to_string())?;
    let token = args.token.or(cfg.token).unwrap_or_default();

    let mut columns: BTreeMap<String, String> = BTreeMap::new();
    for raw in args.filter.iter() {
        let (column, needle) = validation::parse_column_filter(raw)?;
        columns.insert(column, needle);
    }
    let filters = FilterState {
        global: args.search.unwrap_or_default(),
        columns,
    };

    let output = args.output.or(cfg.output);
    let output_format = match args.output_format.or(cfg.output_format) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text or json"))?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    Ok(RunConfig {
        client: ClientOptions {
            base_url,
            token,
            timeout_seconds: args.timeout.or(cfg.timeout).unwrap_or(10),
            proxy: args.proxy.or(cfg.proxy),
        },
        page: args.page.unwrap_or(1),
        page_size: args.page_size.or(cfg.page_size).unwrap_or(25),
        filters,
        fetch_all: args.all,
        live: args.live,
        debounce: cfg
            .debounce_ms
            .map(Duration::from_millis)
            .unwrap_or(search::DEFAULT_QUIET),
        output,
        output_format,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
        command: args.command,
    })
}

const SEARCHABLE: &[(&str, &[&str])] = &[
    ("ventures", &["name", "location", "status"]),
    ("properties", &["plot_no", "facing", "status"]),
    ("members", &["name", "phone", "cadre"]),
    ("call-logs", &["caller", "phone", "purpose"]),
    ("visitor-logs", &["visitor", "phone"]),
    ("expense-bills", &["head", "billed_on"]),
];

fn searchable_for(path: &str) -> Vec<String> {
    SEARCHABLE
        .iter()
        .find(|(p, _)| *p == path)
        .map(|(_, cols)| cols.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default()
}

struct ListSpec {
    path: &'static str,
    query: Vec<(&'static str, String)>,
}

fn list_spec(command: &Command) -> Option<ListSpec> {
    let mut query: Vec<(&'static str, String)> = Vec::new();
    let path = match command {
        Command::Ventures => "ventures",
        Command::Properties { venture } => {
            if let Some(v) = venture {
                query.push(("venture_id", v.to_string()));
            }
            "properties"
        }
        Command::Members { cadre } => {
            if let Some(raw) = cadre {
                if let Some(c) = Cadre::parse(raw) {
                    query.push(("cadre", c.as_str().to_string()));
                }
            }
            "members"
        }
        Command::Calls => "call-logs",
        Command::Visitors { venture } => {
            if let Some(v) = venture {
                query.push(("venture_id", v.to_string()));
            }
            "visitor-logs"
        }
        Command::Expenses => "expense-bills",
        Command::Dashboard
        | Command::Team { .. }
        | Command::LogCall { .. }
        | Command::Approve { .. }
        | Command::DropCall { .. } => return None,
    };
    Some(ListSpec { path, query })
}

/// One list screen: fetch, settle, table, render. Decode and HTTP
/// failures degrade to an empty table with a diagnostic on stderr,
/// matching how the screens behave in the browser console.
async fn run_list(run: &RunConfig, client: &ApiClient, spec: ListSpec) -> Result<PageView, String> {
    let outcome = if run.fetch_all || !run.filters.is_empty() {
        // Client-side mode: the whole result set is pulled locally, then
        // filtered and sliced here.
        let pb = progress_bar(run.no_color, spec.path);
        let fetched =
            resources::fetch_all_pages(client, spec.path, &spec.query, |page, last| {
                pb.set_length(last);
                pb.set_position(page);
            })
            .await;
        pb.finish_and_clear();
        match fetched {
            Ok(rows) if rows.is_empty() => FetchOutcome::Empty,
            Ok(rows) => FetchOutcome::Rows { rows, meta: None },
            Err(e) => FetchOutcome::Failed {
                reason: e.to_string(),
            },
        }
    } else {
        // Server-side mode: one page, trusted as-is.
        let mut query = spec.query.clone();
        query.push(("page", run.page.to_string()));
        client::settle(client.get_payload(spec.path, &query).await)
    };

    let view = match outcome {
        FetchOutcome::Rows { rows, meta: Some(meta) } => TableState::server(rows, meta).view(),
        FetchOutcome::Rows { rows, meta: None } => {
            let mut state = TableState::local(rows, searchable_for(spec.path), run.page_size);
            if !run.filters.global.trim().is_empty() {
                state.set_global_filter(run.filters.global.clone());
            }
            for (column, needle) in run.filters.columns.iter() {
                state.set_column_filter(column.clone(), needle.clone());
            }
            // Page is applied after the filters so the reset-to-1 rule
            // cannot strand the view.
            state.set_page(run.page);
            state.view()
        }
        FetchOutcome::Empty => {
            eprintln!("{}", "no records".dimmed());
            empty_view(run)
        }
        FetchOutcome::Failed { reason } => {
            eprintln!("{} {}", "request failed:".yellow().bold(), reason);
            empty_view(run)
        }
    };
    Ok(view)
}

fn empty_view(run: &RunConfig) -> PageView {
    PageView {
        rows: Vec::new(),
        page: 1,
        page_size: run.page_size.max(1),
        total_rows: 0,
        total_pages: 1,
    }
}

fn progress_bar(no_color: bool, path: &str) -> ProgressBar {
    let pb = if no_color {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(1)
    };
    if let Ok(style) = ProgressStyle::with_template("{msg} page {pos}/{len}") {
        pb.set_style(style);
    }
    pb.set_message(format!("fetching {path}"));
    pb
}

/// Live search against one list endpoint: stdin lines are debounced into
/// queries, each query fires a server-side search, and only the newest
/// in-flight response is rendered. Ctrl-D ends the session.
async fn run_live(run: &RunConfig, client: &ApiClient, spec: ListSpec) -> Result<(), String> {
    let (query_tx, query_rx) = mpsc::channel::<String>(64);
    let (out_tx, mut out_rx) = mpsc::channel::<(String, FetchOutcome)>(64);

    let fetch_client = client.clone();
    let path = spec.path;
    let base_query = spec.query.clone();
    let fetch = move |query: String| {
        let client = fetch_client.clone();
        let mut params = base_query.clone();
        async move {
            let needle = query.trim().to_string();
            if !needle.is_empty() {
                params.push(("q", needle));
            }
            client::settle(client.get_payload(path, &params).await)
        }
    };
    let loop_handle = tokio::spawn(search::search_loop(
        query_rx,
        run.debounce,
        fetch,
        out_tx,
    ));

    let reader_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if query_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    println!(":: live search on {} (one query per line, Ctrl-D to quit)", spec.path);
    while let Some((query, outcome)) = out_rx.recv().await {
        let view = match outcome {
            FetchOutcome::Rows { rows, meta: Some(meta) } => TableState::server(rows, meta).view(),
            FetchOutcome::Rows { rows, meta: None } => {
                TableState::local(rows, searchable_for(path), run.page_size).view()
            }
            FetchOutcome::Empty => empty_view(run),
            FetchOutcome::Failed { reason } => {
                eprintln!("{} {}", "request failed:".yellow().bold(), reason);
                empty_view(run)
            }
        };
        format_kv_line("search", query.trim());
        print!("{}", String::from_utf8_lossy(&output::render_text(&view, run.no_color)));
    }

    let _ = reader_handle.await;
    let _ = loop_handle.await;
    Ok(())
}

async fn run_dashboard(run: &RunConfig, client: &ApiClient) -> Result<(), String> {
    let counts = resources::dashboard_counts(client).await;
    for (name, count) in counts {
        match count {
            Ok(n) => format_kv_line(name, &n.to_string()),
            Err(e) if run.no_color => format_kv_line(name, &format!("unavailable ({e})")),
            Err(e) => format_kv_line(name, &format!("unavailable ({e})").yellow().to_string()),
        }
    }
    Ok(())
}

async fn run_team(run: &RunConfig, client: &ApiClient, member_id: u64) -> Result<(), String> {
    let levels = resources::team_report(client, member_id)
        .await
        .map_err(|e| e.to_string())?;
    if levels.is_empty() {
        println!("no member with id {member_id}");
        return Ok(());
    }
    if run.output_format == OutputFormat::Json {
        let rendered =
            serde_json::to_string_pretty(&levels).map_err(|e| format!("render failed: {e}"))?;
        emit(run, rendered.into_bytes()).await?;
        return Ok(());
    }
    let mut out = String::new();
    for level in levels {
        let cadres = level
            .cadre_counts
            .iter()
            .map(|(c, n)| format!("{}x{}", n, c.as_str()))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "level {:<2} :: {:>4} member(s) :: dip {:>12.2} :: {}\n",
            level.depth, level.members, level.dip_total, cadres
        ));
    }
    emit(run, out.into_bytes()).await
}

async fn emit(run: &RunConfig, rendered: Vec<u8>) -> Result<(), String> {
    match run.output.as_deref() {
        None => {
            print!("{}", String::from_utf8_lossy(&rendered));
            Ok(())
        }
        Some(path) => {
            let path = config::expand_tilde_string(path);
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .await
                .map_err(|e| format!("failed to open output file '{path}': {e}"))?;
            outfile
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write output file '{path}': {e}"))?;
            println!(":: wrote {}", path);
            Ok(())
        }
    }
}

/// Form submissions: success prints a confirmation, API validation
/// messages are surfaced verbatim as form-level errors.
fn submit(result: Result<serde_json::Value, crate::client::ApiError>, done: &str) -> Result<(), String> {
    use crate::client::ApiError;
    match result {
        Ok(_) => {
            println!(":: {done}");
            Ok(())
        }
        Err(ApiError::Validation { messages }) => {
            for m in messages {
                eprintln!("{} {}", "invalid:".red().bold(), m);
            }
            Err("submission rejected by the API".to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

pub async fn run_async(run: RunConfig) -> Result<(), String> {
    let client = ApiClient::new(&run.client).map_err(|e| e.to_string())?;

    match &run.command {
        Command::Dashboard => run_dashboard(&run, &client).await,
        Command::Team { member_id } => run_team(&run, &client, *member_id).await,
        Command::LogCall {
            caller,
            phone,
            purpose,
        } => {
            submit(
                resources::log_call(&client, caller, phone, purpose).await,
                "call logged",
            )
        }
        Command::Approve { bill_id } => submit(
            resources::approve_expense(&client, *bill_id).await,
            "bill approved",
        ),
        Command::DropCall { id } => submit(
            resources::delete_call_log(&client, *id).await,
            "call log deleted",
        ),
        other => match list_spec(other) {
            Some(spec) if run.live => run_live(&run, &client, spec).await,
            Some(spec) => {
                let view = run_list(&run, &client, spec).await?;
                let rendered = match run.output_format {
                    OutputFormat::Text => output::render_text(&view, run.no_color),
                    OutputFormat::Json => output::render_json(&view),
                };
                emit(&run, rendered).await
            }
            None => Ok(()),
        },
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{}", e.render());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let cfg = match args.config.clone() {
        Some(path) => {
            let path = config::expand_tilde(&path);
            config::load_config(&path, false)?
        }
        None => match config::default_config_path() {
            Some(path) => {
                config::ensure_default_config_file(&path)?;
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner(run.no_color);
    format_kv_line("endpoint", &run.client.base_url);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    fn base_cfg() -> ConfigFile {
        ConfigFile {
            base_url: Some("https://backoffice.example.com/api/".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn cli_flags_override_config() {
        let args = CliArgs::parse_from([
            "plotdesk",
            "--base-url",
            "https://other.example.com/api/",
            "--page-size",
            "5",
            "ventures",
        ]);
        let run = build_run_config(args, base_cfg()).unwrap();
        assert_eq!(run.client.base_url, "https://other.example.com/api/");
        assert_eq!(run.page_size, 5);
    }

    #[test]
    fn filters_collect_into_filter_state() {
        let args = CliArgs::parse_from([
            "plotdesk",
            "-f",
            "plot_no=A",
            "-f",
            "facing=east",
            "-q",
            "corner",
            "properties",
        ]);
        let run = build_run_config(args, base_cfg()).unwrap();
        assert_eq!(run.filters.global, "corner");
        assert_eq!(run.filters.columns.len(), 2);
        assert_eq!(run.filters.columns["plot_no"], "A");
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let args = CliArgs::parse_from(["plotdesk", "ventures"]);
        assert!(build_run_config(args, ConfigFile::default()).is_err());
    }

    #[test]
    fn output_format_inferred_from_path() {
        let args = CliArgs::parse_from(["plotdesk", "-o", "rows.json", "ventures"]);
        let run = build_run_config(args, base_cfg()).unwrap();
        assert_eq!(run.output_format, OutputFormat::Json);
    }

    #[test]
    fn bad_cadre_is_rejected() {
        let args = CliArgs::parse_from(["plotdesk", "members", "--cadre", "BOSS"]);
        assert!(build_run_config(args, base_cfg()).is_err());
    }
}

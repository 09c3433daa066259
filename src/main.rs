use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

mod buckets;
mod dates;
mod ingest;
mod kpi;
mod models;
mod report;
mod session;
mod view;
mod window;

use dates::{parse_utc_offset, DateNormalizer, ReportZone};
use report::OutputFormat;
use session::{Dashboard, DEFAULT_WINDOW_MINUTES};
use window::{RangeRequest, SubWindow};

#[derive(Parser)]
#[command(name = "ops-event-dashboard")]
#[command(about = "Windowed KPIs and daily series from operational event CSVs", long_about = None)]
struct Cli {
    /// Reporting zone for timestamps, e.g. -03:00. Defaults to local time.
    #[arg(long, global = true, env = "OPS_DASH_UTC_OFFSET")]
    utc_offset: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RangeArgs {
    /// Range start (datetime-local, e.g. 2024-01-01T08:00). Defaults to the earliest timestamp.
    #[arg(long)]
    from: Option<String>,
    /// Range end. Defaults to the latest timestamp.
    #[arg(long)]
    to: Option<String>,
    /// Trailing sub-window inside the range: "all" or minutes
    #[arg(long, default_value = "all")]
    sub_window: SubWindow,
}

impl RangeArgs {
    fn into_request(self) -> RangeRequest {
        RangeRequest {
            from: self.from,
            to: self.to,
            sub_window: self.sub_window,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show row count, timestamp diagnostics and the range defaults
    Inspect {
        #[arg(long)]
        csv: PathBuf,
    },
    /// KPIs for the window ending at the latest timestamp
    Relative {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = DEFAULT_WINDOW_MINUTES, value_parser = clap::value_parser!(u32).range(1..))]
        window_minutes: u32,
    },
    /// KPIs for an explicit date range
    Range {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Generate a report with both views
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = DEFAULT_WINDOW_MINUTES, value_parser = clap::value_parser!(u32).range(1..))]
        window_minutes: u32,
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

async fn open_dashboard(
    csv: PathBuf,
    parser: DateNormalizer,
    window_minutes: u32,
    range: RangeRequest,
) -> anyhow::Result<Dashboard> {
    let mut dashboard = Dashboard::new(parser, window_minutes, range);
    let loaded = ingest::load_csv(csv, parser).await;
    dashboard.install_load(loaded)?;
    Ok(dashboard)
}

fn kpi_summary(title: &str, view: Option<&view::WindowedView>) -> String {
    let Some(view) = view else {
        return format!("{title}: no view for these inputs.\n");
    };
    let mut output = match view.window {
        Some(window) => format!(
            "{title} ({} to {}):\n",
            dates::format_anchor(window.from()),
            dates::format_anchor(window.to())
        ),
        None => format!("{title} (no rows):\n"),
    };
    report::write_kpi_lines(&mut output, &view.kpis);
    output
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let zone = match cli.utc_offset.as_deref() {
        Some(offset) => parse_utc_offset(offset).context("invalid --utc-offset")?,
        None => ReportZone::Local,
    };
    let parser = DateNormalizer::new(zone);

    match cli.command {
        Commands::Inspect { csv } => {
            let dashboard = open_dashboard(
                csv,
                parser,
                DEFAULT_WINDOW_MINUTES,
                RangeRequest::default(),
            )
            .await?;
            if let Some(dataset) = dashboard.dataset() {
                let mut output = String::new();
                report::write_diagnostics(&mut output, dataset);
                println!("CSV loaded: {} rows", dataset.rows.len());
                if let Some(first) = dataset.rows.first() {
                    let columns: Vec<&str> = first.raw().keys().map(String::as_str).collect();
                    println!("Columns: {}", columns.join(", "));
                }
                print!("{output}");
            }
            match dashboard.bounds() {
                Some((from, to)) => println!(
                    "Range defaults: from {} to {}",
                    dates::format_datetime_local(from),
                    dates::format_datetime_local(to)
                ),
                None => println!("Could not interpret any timestamp in the CSV."),
            }
        }
        Commands::Relative {
            csv,
            window_minutes,
        } => {
            let dashboard =
                open_dashboard(csv, parser, window_minutes, RangeRequest::default()).await?;
            println!("{}", dashboard.status());
            print!("{}", kpi_summary("Relative view", dashboard.relative_view()));
        }
        Commands::Range { csv, range } => {
            let request = range.into_request();
            let mut dashboard = open_dashboard(
                csv,
                parser,
                DEFAULT_WINDOW_MINUTES,
                RangeRequest::default(),
            )
            .await?;
            dashboard.apply_range(request).context("range rejected")?;
            print!("{}", kpi_summary("Range view", dashboard.range_view()));
        }
        Commands::Report {
            csv,
            window_minutes,
            range,
            format,
            out,
        } => {
            let request = range.into_request();
            let mut dashboard = open_dashboard(
                csv,
                parser,
                window_minutes,
                RangeRequest::default(),
            )
            .await?;
            if let Err(err) = dashboard.apply_range(request) {
                eprintln!("Range not applied: {err}");
            }

            let rendered = match format {
                OutputFormat::Markdown => report::build_report(&dashboard),
                OutputFormat::Json => report::build_json(&dashboard)?,
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("report written to {}", path.display());
                    println!("Report written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

//! Purpose: `nbpdf` CLI entry point.
//! Role: Binary crate root; parses args, resolves inputs, runs the export batch, reports.
//! Invariants: One stdout line per exported notebook, printed as soon as it finishes.
//! Invariants: Exit code is 0 (all ok or nothing to do), 1 (any export failed), 2 (bad input dir/usage).
//! Invariants: All notebook work goes through `api::Exporter`.
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum, ValueHint, error::ErrorKind as ClapErrorKind};
use tracing_subscriber::EnvFilter;

mod report;

use nbpdf::api::{
    Error, ErrorKind, ExportOptions, Exporter, JupyterCommand, NbconvertExecutor, RenderOptions,
    WebPdfRenderer, export_all, find_notebooks, program_dir, resolve_notebooks_dir, to_exit_code,
};
use report::{AnsiColor, colorize_label, error_text, failure_line, success_line, summary_lines};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[derive(Parser)]
#[command(
    name = "nbpdf",
    version,
    about = "Export Jupyter notebooks to PDF without code cells",
    long_about = None,
    after_help = r#"EXAMPLES
  $ nbpdf
  $ nbpdf --output-dir outputs/pdfs
  $ nbpdf --overwrite --no-execute

Requires `jupyter nbconvert` with the webpdf exporter (pip install 'nbconvert[webpdf]')
and a Chromium/Chrome the exporter can find."#
)]
struct Cli {
    #[arg(
        long,
        default_value = "notebooks",
        help = "Directory with .ipynb files (also tried next to the nbpdf binary)",
        value_hint = ValueHint::DirPath
    )]
    notebooks_dir: PathBuf,
    #[arg(
        long,
        help = "Directory to write PDFs (default: same as notebooks)",
        value_hint = ValueHint::DirPath
    )]
    output_dir: Option<PathBuf>,
    #[arg(long, help = "Overwrite existing PDFs if they exist")]
    overwrite: bool,
    #[arg(long, help = "Skip execution and convert the saved outputs as-is")]
    no_execute: bool,
    #[arg(
        long,
        default_value_t = 600,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Upper bound for executing one whole notebook"
    )]
    timeout: u64,
    #[arg(
        long,
        default_value_t = 600,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Upper bound for rendering one PDF"
    )]
    render_timeout: u64,
    #[arg(
        long,
        env = "NBPDF_JUPYTER",
        default_value = "jupyter",
        help = "Jupyter executable used for nbconvert",
        value_hint = ValueHint::ExecutablePath
    )]
    jupyter: PathBuf,
    #[arg(long, help = "Do not let nbconvert download Chromium")]
    no_chromium_download: bool,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize labels: auto|always|never"
    )]
    color: ColorMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(std::env::args_os()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(clap_error_summary(&err))
                        .with_hint("Try `nbpdf --help`."),
                    ColorMode::Auto,
                ));
            }
        },
    };
    init_tracing();

    let color_mode = cli.color;
    let notebooks_dir = resolve_notebooks_dir(&cli.notebooks_dir, program_dir().as_deref())
        .map_err(|err| (err, color_mode))?;
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| notebooks_dir.clone());

    let notebooks = find_notebooks(&notebooks_dir).map_err(|err| (err, color_mode))?;
    if notebooks.is_empty() {
        println!("No notebooks found in {}", notebooks_dir.display());
        return Ok(RunOutcome::ok());
    }

    println!(
        "Exporting {} notebooks from {} to {} (exclude code cells)",
        notebooks.len(),
        notebooks_dir.display(),
        output_dir.display()
    );

    let jupyter = JupyterCommand::new(cli.jupyter.clone());
    let render_options = RenderOptions {
        allow_chromium_download: !cli.no_chromium_download,
        timeout: Some(Duration::from_secs(cli.render_timeout)),
        ..RenderOptions::default()
    };
    let export_options = ExportOptions {
        output_dir,
        overwrite: cli.overwrite,
        execute: !cli.no_execute,
        timeout: Some(Duration::from_secs(cli.timeout)),
    };
    let exporter = Exporter::new(
        NbconvertExecutor::new(jupyter.clone()),
        WebPdfRenderer::new(jupyter, render_options),
        export_options,
    );

    let use_color = color_mode.use_color(io::stderr().is_terminal());
    let report = export_all(
        &exporter,
        &notebooks,
        |success| println!("{}", success_line(success)),
        |failure| {
            eprintln!(
                "{} {}",
                colorize_label("!", use_color, AnsiColor::Red),
                failure_line(failure)
            )
        },
    );

    if !report.failures.is_empty() {
        eprintln!();
        for line in summary_lines(&report) {
            eprintln!("{line}");
        }
    }
    Ok(RunOutcome::with_code(report.exit_code()))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let use_color = color_mode.use_color(io::stderr().is_terminal());
    eprintln!("{}", error_text(err, use_color));
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

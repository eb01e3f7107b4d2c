//! `gradestat` command-line interface.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gradestat::output::{render, render_errors, write_output};
use gradestat::{select_specs, spec_by_name, spec_names, EngineConfig, Layout, OutputFormat, Result, StudentAnalysis};

#[derive(Parser)]
#[command(name = "gradestat")]
#[command(version)]
#[command(about = "Grouped grade statistics over student performance data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run aggregation specs over a student file
    Analyze {
        /// Input file
        file: PathBuf,

        /// Column layout of the input
        #[arg(short, long, value_enum, default_value = "comma")]
        layout: LayoutArg,

        /// Field delimiter for `--layout header`
        #[arg(short, long, default_value_t = ',')]
        delimiter: char,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        format: FormatArg,

        /// Spec to run (repeatable). Defaults to every built-in spec
        #[arg(short, long = "spec")]
        specs: Vec<String>,

        /// Stop after this many data rows
        #[arg(long)]
        limit: Option<usize>,

        /// Shard the input across worker threads
        #[arg(long)]
        parallel: bool,

        /// Shard count for --parallel (0 = one per thread)
        #[arg(long)]
        partitions: Option<usize>,

        /// Write results here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the skipped-row report to stderr
        #[arg(long)]
        errors: bool,
    },

    /// List the built-in specs
    Specs,
}

#[derive(Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// Comma-delimited, school first
    Comma,
    /// Semicolon-delimited, sex first
    Semicolon,
    /// Columns found by header name, split on --delimiter
    Header,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl LayoutArg {
    fn into_layout(self, delimiter: char) -> Layout {
        match self {
            LayoutArg::Comma => Layout::Comma,
            LayoutArg::Semicolon => Layout::Semicolon,
            LayoutArg::Header => Layout::Header { delimiter },
        }
    }
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

fn main() -> ExitCode {
    // stdout carries results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradestat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Analyze {
            file,
            layout,
            delimiter,
            format,
            specs,
            limit,
            parallel,
            partitions,
            output,
            errors,
        } => {
            let format = OutputFormat::from(format);
            let mut config = EngineConfig::default();
            if let Some(limit) = limit {
                config = config.with_row_limit(limit);
            }
            if let Some(partitions) = partitions {
                config = config.with_partitions(partitions);
            }
            let places = config.decimal_places;

            let mut analysis = StudentAnalysis::new(layout.into_layout(delimiter))
                .with_config(config)
                .parallel(parallel);
            if !specs.is_empty() {
                analysis = analysis.with_specs(select_specs(&specs)?);
            }

            let run = analysis.analyze_file(&file)?;
            match output {
                Some(path) => write_output(&path, &run.results, format, places)?,
                None => {
                    let rendered = render(&run.results, format, places)?;
                    std::io::stdout().lock().write_all(rendered.as_bytes())?;
                }
            }

            if errors {
                eprint!("{}", render_errors(&run.errors, format)?);
            }
        }

        Commands::Specs => {
            let mut stdout = std::io::stdout().lock();
            for name in spec_names() {
                let description = spec_by_name(&name)
                    .map(|s| s.description().to_string())
                    .unwrap_or_default();
                writeln!(stdout, "{:<28} {}", name, description)?;
            }
        }
    }

    Ok(())
}

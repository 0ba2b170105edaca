//! unshade CLI - Word document table repair tool
//!
//! A command-line tool that rewrites every table in a .docx file to plain
//! black text on a white background with visible borders.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use unshade::{BorderMode, FixOptions};

/// Repair unreadable tables in Word documents
#[derive(Parser)]
#[command(
    name = "unshade",
    version,
    about = "Repair unreadable tables in Word documents",
    long_about = "unshade - Word document table repair tool.\n\n\
                  Strips dark cell shading from every table in a .docx file and\n\
                  normalizes table text to plain black, non-bold, non-italic,\n\
                  with visible borders. Everything outside tables is preserved."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fix every table in a document
    Fix {
        /// Input file path
        input: PathBuf,

        /// Output file path (default: <input>_fixed.docx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Border policy
        #[arg(long, default_value = "style-grid")]
        mode: Mode,

        /// Print the repair report as JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show table information for a document
    Info {
        /// Input file path
        input: PathBuf,
    },

    /// Show version information
    Version,
}

/// Border policy
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Assign the built-in "TableGrid" style to every table
    StyleGrid,
    /// Stamp explicit single-line borders on tables and cells
    ExplicitBorders,
}

impl From<Mode> for BorderMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::StyleGrid => BorderMode::StyleGrid,
            Mode::ExplicitBorders => BorderMode::ExplicitBorders,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Fix {
            input,
            output,
            mode,
            json,
        } => {
            let pb = create_spinner("Fixing tables...");

            let options = FixOptions::with_border_mode(mode.into());
            let (fixed, report) = unshade::fix_file(&input, &options)?;

            let output = output.unwrap_or_else(|| {
                PathBuf::from(unshade::fixed_filename(&input.to_string_lossy()))
            });
            fs::write(&output, fixed)?;

            pb.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} Fixed {} tables: {}",
                    "✓".green().bold(),
                    report.tables,
                    output.display()
                );
                println!("{}: {}", "Cells cleared".bold(), report.cells_cleared);
                println!("{}: {}", "Runs normalized".bold(), report.runs_normalized);
                println!(
                    "{}: {}",
                    "Paragraphs restyled".bold(),
                    report.paragraphs_restyled
                );
                if report.paragraphs_skipped > 0 || report.runs_skipped > 0 {
                    println!(
                        "{} Skipped {} paragraphs, {} runs",
                        "!".yellow().bold(),
                        report.paragraphs_skipped,
                        report.runs_skipped
                    );
                }
            }
        }

        Commands::Info { input } => {
            let pb = create_spinner("Analyzing document...");

            let data = fs::read(&input)?;
            let summary = unshade::summarize_bytes(&data)?;

            pb.finish_and_clear();

            println!("{}", "Document Information".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                input.file_name().unwrap_or_default().to_string_lossy()
            );
            println!("{}: {}", "Tables".bold(), summary.tables.len());
            println!("{}: {}", "Shaded cells".bold(), summary.shaded_cells());
            println!("{}: {}", "Body paragraphs".bold(), summary.body_paragraphs);

            for (i, table) in summary.tables.iter().enumerate() {
                println!("\n{} {}", "Table".cyan().bold(), i + 1);
                println!("{}", "─".repeat(40));
                println!("{}: {}", "Rows".bold(), table.rows);
                println!("{}: {}", "Cells".bold(), table.cells);
                println!("{}: {}", "Shaded cells".bold(), table.shaded_cells);
                if let Some(ref style) = table.style {
                    println!("{}: {}", "Style".bold(), style);
                }
                if table.has_explicit_borders {
                    println!("{}: yes", "Explicit borders".bold());
                }
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn print_version() {
    println!("{} {}", "unshade".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Word document table repair tool");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

//! Command-line interface for running the preprocessing and training
//! workflow over the sample datasets.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::{DatasetConfig, SAMPLE_DATASETS_PATH, TEMP_FOLDER_PATH};
use crate::dataset::DatasetReader;
use crate::preprocessing::detect_missing_values;
use crate::telemetry::DEFAULT_LOG_LEVEL;
use crate::training::ModelPerformance;
use crate::workflow::{self, RunOptions, RunSummary};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ml-workspace")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preprocess tabular datasets and train a fixed menu of models")]
#[command(long_about = None)]
pub struct Cli {
    /// Folder holding one sub-folder per sample dataset
    #[arg(long, global = true, default_value = SAMPLE_DATASETS_PATH)]
    pub samples_dir: PathBuf,

    /// Folder the per-run working directories are created in
    #[arg(long, global = true, default_value = TEMP_FOLDER_PATH)]
    pub output_dir: PathBuf,

    /// Log level for this crate when RUST_LOG is not set
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preprocess a sample dataset and train every model of its problem type
    Run {
        /// Sample dataset name
        dataset: String,
    },

    /// Only run the preprocessing stages
    Preprocess {
        /// Sample dataset name
        dataset: String,
    },

    /// List the sample datasets
    List,

    /// Show a sample dataset's configuration and missing values
    Info {
        /// Sample dataset name
        dataset: String,
    },
}

impl Cli {
    fn options(&self, dataset: &str) -> RunOptions {
        RunOptions::new(dataset)
            .with_samples_dir(&self.samples_dir)
            .with_output_dir(&self.output_dir)
    }

    fn reader(&self) -> DatasetReader {
        DatasetReader::new(&self.samples_dir)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn execute(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Run { dataset }) => cmd_run(&cli.options(dataset)),
        Some(Commands::Preprocess { dataset }) => cmd_run(&cli.options(dataset).preprocess_only()),
        Some(Commands::List) => cmd_list(&cli.reader()),
        Some(Commands::Info { dataset }) => cmd_info(&cli.reader(), dataset),
        None => cmd_interactive(cli),
    }
}

pub fn cmd_run(options: &RunOptions) -> anyhow::Result<()> {
    section(&format!("Run · {}", options.dataset_name));
    let start = Instant::now();
    let summary = workflow::run(options)?;
    step_ok(&format!("finished in {:.2}s", start.elapsed().as_secs_f64()));
    print_summary(&summary);
    Ok(())
}

pub fn cmd_list(reader: &DatasetReader) -> anyhow::Result<()> {
    section("Sample datasets");
    let datasets = reader.list_sample_datasets()?;
    if datasets.is_empty() {
        println!("  {}", dim(&format!("none found in {}", reader.samples_dir().display())));
    }
    for name in datasets {
        println!("  {} {}", accent("›"), name);
    }
    println!();
    Ok(())
}

pub fn cmd_info(reader: &DatasetReader, dataset: &str) -> anyhow::Result<()> {
    let (df, config) = reader.read_dataset(dataset)?;
    section(&format!("Dataset · {}", config.dataset_name));

    println!("  {:<14} {}", muted("Problem"), config.problem_type);
    println!("  {:<14} {} × {}", muted("Shape"), df.height(), df.width());
    let split = &config.dataset_split_config;
    println!(
        "  {:<14} {} / {} / {}",
        muted("Split"),
        split.training,
        split.testing,
        split.validation
    );

    section("Columns");
    let (missing, total_missing) = detect_missing_values(&df)?;
    for column in &config.columns {
        let nulls = missing
            .iter()
            .find(|(name, _)| *name == column.name)
            .map_or(0, |(_, n)| *n);
        println!(
            "  {:<20} {:<12} {}",
            column.name.white(),
            muted(&format!("{:?}", column.feature_type).to_lowercase()),
            dim(&describe_column(&config, &column.name, nulls))
        );
    }
    println!();
    println!("  {:<14} {}", muted("Missing"), total_missing);
    println!();
    Ok(())
}

fn describe_column(config: &DatasetConfig, name: &str, nulls: usize) -> String {
    let Some(column) = config.column(name) else {
        return String::new();
    };
    let mut parts = Vec::new();
    if column.target {
        parts.push("target".to_string());
    }
    if column.drop {
        parts.push("dropped".to_string());
    }
    if let Some(method) = column.missing {
        parts.push(format!("impute {:?}", method).to_lowercase());
    }
    if let Some(method) = column.encode {
        parts.push(format!("encode {}", method.as_str()));
    }
    if let Some(method) = column.scale {
        parts.push(format!("scale {}", method));
    }
    if nulls > 0 {
        parts.push(format!("{} missing", nulls));
    }
    parts.join(", ")
}

fn print_summary(summary: &RunSummary) {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", summary.preprocessing.config.dataset_name.white().bold()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    for (name, rows) in summary.split_sizes() {
        line_box(&kv(&format!("{:<11}", name), &format!("{} rows", rows)));
    }
    line_box(&kv(
        &format!("{:<11}", "encodings"),
        &summary.preprocessing.encodings.len().to_string(),
    ));
    line_box(&kv(
        &format!("{:<11}", "scalers"),
        &summary.preprocessing.scalers.len().to_string(),
    ));
    line_box_empty();
    line_box_bottom();

    if !summary.performances.is_empty() {
        section("Models");
        for performance in &summary.performances {
            println!("  {}", performance_row(performance));
        }
    }

    println!();
    println!("  {} {}", muted("artifacts"), summary.working_directory.path().display());
    println!();
}

fn performance_row(performance: &ModelPerformance) -> String {
    match performance {
        ModelPerformance::Classification(p) => format!(
            "{:<24} {} {:.4}  {} {:.4}",
            p.model.white(),
            muted("accuracy"),
            p.accuracy,
            muted("f1"),
            p.f1
        ),
        ModelPerformance::Regression(p) => format!(
            "{:<24} {} {:.4}  {} {:.4}",
            p.model.white(),
            muted("rmse"),
            p.root_mean_squared_error,
            muted("r2"),
            p.r2_score
        ),
    }
}

// ─── Interactive mode ──────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("       {}", "ml-workspace".truecolor(120, 170, 255).bold());
    println!("       {}", dim(&format!("preprocess · train · evaluate  ·  v{}", env!("CARGO_PKG_VERSION"))));
    println!();
}

/// Pick a sample dataset from a menu and run the whole workflow on it
pub fn cmd_interactive(cli: &Cli) -> anyhow::Result<()> {
    use dialoguer::{Select, theme::ColorfulTheme};

    print_banner();

    let datasets = cli.reader().list_sample_datasets()?;
    if datasets.is_empty() {
        anyhow::bail!("no sample datasets found in {}", cli.samples_dir.display());
    }

    let theme = ColorfulTheme {
        active_item_prefix: dialoguer::console::style("  ›".to_string()).for_stderr().cyan(),
        active_item_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        inactive_item_prefix: dialoguer::console::style("   ".to_string()).for_stderr(),
        inactive_item_style: dialoguer::console::Style::new().for_stderr().color256(245),
        prompt_prefix: dialoguer::console::style("  ?".to_string()).for_stderr().color256(111),
        prompt_style: dialoguer::console::Style::new().for_stderr().white().bold(),
        ..ColorfulTheme::default()
    };

    let selection = Select::with_theme(&theme)
        .with_prompt("Pick a sample dataset")
        .items(&datasets)
        .default(0)
        .interact_opt()?;

    match selection {
        Some(index) => cmd_run(&cli.options(&datasets[index])),
        None => {
            println!();
            println!("  {}", dim("goodbye"));
            println!();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "ml-workspace",
            "--output-dir",
            "out",
            "run",
            "titanic",
            "--samples-dir",
            "data",
        ])
        .unwrap();
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert_eq!(cli.samples_dir, PathBuf::from("data"));
        assert!(matches!(cli.command, Some(Commands::Run { ref dataset }) if dataset == "titanic"));
    }

    #[test]
    fn test_strip_ansi() {
        let coloured = format!("{}", "abc".red());
        assert_eq!(strip_ansi(&coloured), "abc");
    }
}

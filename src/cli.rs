use crate::analyzer::{ManifestFamily, OutputFormat, Severity};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "manifest-lint")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lint Kubernetes manifests and Docker Compose files")]
#[command(
    long_about = "Checks Kubernetes manifests and Docker Compose files for schema errors, security and reliability problems and broken references between resources, and grades each input on a 0-100 scale."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a manifest file, a directory of manifests, or standard input
    Lint {
        /// File or directory to analyze; `-` reads standard input
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: FormatArg,

        /// Manifest family; detected from the input when `auto`
        #[arg(long, value_enum, default_value = "auto")]
        family: FamilyArg,

        /// Minimum severity that makes the run fail
        #[arg(long, value_enum)]
        threshold: Option<ThresholdArg>,

        /// Only run these rules
        #[arg(long, value_name = "RULE")]
        include: Vec<String>,

        /// Never run these rules
        #[arg(long, value_name = "RULE")]
        exclude: Vec<String>,

        /// Always exit with status 0
        #[arg(long)]
        no_fail: bool,
    },

    /// List the built-in rules
    Rules {
        /// Output rule definitions as JSON
        #[arg(long)]
        json: bool,

        /// Only list rules of one family
        #[arg(long, value_enum)]
        family: Option<FamilyArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Plain,
    Json,
    Sarif,
    Github,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Plain => OutputFormat::Plain,
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Sarif => OutputFormat::Sarif,
            FormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    Auto,
    Kubernetes,
    Compose,
}

impl FamilyArg {
    /// The forced family, if any.
    pub fn family(self) -> Option<ManifestFamily> {
        match self {
            FamilyArg::Auto => None,
            FamilyArg::Kubernetes => Some(ManifestFamily::Kubernetes),
            FamilyArg::Compose => Some(ManifestFamily::Compose),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThresholdArg {
    Error,
    Warning,
    Info,
}

impl From<ThresholdArg> for Severity {
    fn from(arg: ThresholdArg) -> Self {
        match arg {
            ThresholdArg::Error => Severity::Error,
            ThresholdArg::Warning => Severity::Warning,
            ThresholdArg::Info => Severity::Info,
        }
    }
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}

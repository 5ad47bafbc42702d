use crate::analyzer::{
    AnalyzerConfig, FileReport, ManifestFamily, OutputFormat, Severity, analyze, format_reports,
};
use crate::handlers::CommandOutput;
use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Display path used for standard input.
pub const STDIN_PATH: &str = "<stdin>";

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Options of the `lint` command.
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub family: Option<ManifestFamily>,
    pub threshold: Option<Severity>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub no_fail: bool,
}

/// Load the configuration file, falling back to the default locations.
pub fn load_config(explicit: Option<&Path>) -> Result<AnalyzerConfig> {
    match explicit {
        Some(path) => AnalyzerConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(AnalyzerConfig::load_from_default().unwrap_or_default()),
    }
}

/// Command-line flags take precedence over the configuration file.
fn apply_options(mut config: AnalyzerConfig, options: &LintOptions) -> AnalyzerConfig {
    if options.family.is_some() {
        config.family = options.family;
    }
    if let Some(threshold) = options.threshold {
        config.failure_threshold = threshold;
    }
    config.include.extend(options.include.iter().cloned());
    config.exclude.extend(options.exclude.iter().cloned());
    config.no_fail |= options.no_fail;
    config
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Collect the manifest files under a path, in a stable order.
pub fn discover_files(root: &Path, config: &AnalyzerConfig) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("{} does not exist", root.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !is_manifest(path) {
            continue;
        }
        if config.should_ignore_path(path) {
            log::debug!("ignoring {}", path.display());
            continue;
        }
        files.push(path.to_path_buf());
    }
    log::info!("found {} manifest file(s) under {}", files.len(), root.display());
    Ok(files)
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read standard input")?;
    Ok(text)
}

/// Analyze each input and render the reports.
pub fn handle_lint(options: LintOptions, config_path: Option<&Path>) -> Result<CommandOutput> {
    let config = apply_options(load_config(config_path)?, &options);

    let reports = if options.path.as_os_str() == "-" {
        vec![FileReport::new(STDIN_PATH, analyze(&read_stdin()?, &config))]
    } else {
        let files = discover_files(&options.path, &config)?;
        if files.is_empty() {
            log::warn!("no manifest files found under {}", options.path.display());
        }
        let texts = files
            .iter()
            .map(|file| {
                std::fs::read_to_string(file)
                    .with_context(|| format!("failed to read {}", file.display()))
                    .map(|text| (file.display().to_string(), text))
            })
            .collect::<Result<Vec<_>>>()?;
        texts
            .into_par_iter()
            .map(|(path, text)| FileReport::new(path, analyze(&text, &config)))
            .collect()
    };

    let failed = reports.iter().any(|r| r.result.should_fail(&config));
    Ok(CommandOutput {
        text: format_reports(&reports, options.format),
        failed,
    })
}

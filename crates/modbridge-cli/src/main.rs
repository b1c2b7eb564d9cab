use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use modbridge_analyzer::SourceAnalyzer;
use modbridge_core::{Config, Report};
use modbridge_engine::{ModuleVerdict, Pipeline, RefStatus, Scanner};
use modbridge_rules::Ruleset;

/// Modbridge - binary compatibility bridging for extension modules
#[derive(Parser)]
#[command(name = "modbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: modbridge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite extension modules against a compatibility ruleset
    Rewrite {
        /// Module image files to process
        modules: Vec<PathBuf>,

        /// Path to the compatibility ruleset (ruleset.json)
        #[arg(short, long)]
        ruleset: PathBuf,

        /// Directory to write load-ready module images into
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,
    },

    /// Analyze extension source for risky host-API access patterns
    Analyze {
        /// Source files or directories to analyze
        paths: Vec<PathBuf>,

        /// Path to the compatibility ruleset (ruleset.json)
        #[arg(short, long)]
        ruleset: PathBuf,

        /// File extension to pick up when walking directories
        #[arg(long, default_value = "cs")]
        ext: String,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        /// Also output a markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,
    },

    /// Dump a module's scanned references and their classification
    Inspect {
        /// Module image file
        module: PathBuf,

        /// Path to the compatibility ruleset (ruleset.json)
        #[arg(short, long)]
        ruleset: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("modbridge.toml").exists() {
        Config::from_file(Path::new("modbridge.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    match cli.command {
        Commands::Rewrite {
            modules,
            ruleset,
            out_dir,
            output,
        } => rewrite_command(&config, &modules, &ruleset, out_dir.as_deref(), &output, cli.verbose),
        Commands::Analyze {
            paths,
            ruleset,
            ext,
            output,
            markdown,
        } => analyze_command(
            &config,
            &paths,
            &ruleset,
            &ext,
            &output,
            markdown.as_deref(),
            cli.verbose,
        ),
        Commands::Inspect { module, ruleset } => inspect_command(&module, &ruleset),
    }
}

fn load_ruleset(path: &Path, verbose: bool) -> Result<modbridge_rules::CompiledRuleset> {
    let ruleset = Ruleset::from_file(path)
        .with_context(|| format!("failed to load ruleset from {}", path.display()))?;
    if verbose {
        eprintln!(
            "{} {} rules, {} facades for {} {}",
            "Loaded".cyan(),
            ruleset.rules.len(),
            ruleset.facades.len(),
            ruleset.host.name,
            ruleset.host.version
        );
    }
    ruleset.compile().context("ruleset failed validation")
}

/// Rewrite command - process module images through the pipeline
fn rewrite_command(
    config: &Config,
    modules: &[PathBuf],
    ruleset_path: &Path,
    out_dir: Option<&Path>,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let ruleset = load_ruleset(ruleset_path, verbose)?;
    let pipeline = Pipeline::new(&ruleset);
    let mut report = Report::new();

    for path in modules {
        let label = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("<module>");

        if config.is_module_skipped(label) {
            if verbose {
                eprintln!("{} {} (configured skip)", "Skipping".yellow(), label);
            }
            continue;
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read module {}", path.display()))?;
        let verdict = pipeline.process(label, &bytes);

        match &verdict {
            ModuleVerdict::Ready(module) => {
                eprintln!(
                    "  {} {} ({} rewrites)",
                    "✓".green(),
                    module.image.name,
                    module.applied.len()
                );
                if verbose {
                    for applied in &module.applied {
                        eprintln!("      {} [{}] {}", applied.site, applied.rule_id, applied.description);
                    }
                }
                if let Some(dir) = out_dir {
                    std::fs::create_dir_all(dir)?;
                    let target = dir.join(path.file_name().unwrap_or_default());
                    std::fs::write(&target, &module.bytes)
                        .with_context(|| format!("failed to write {}", target.display()))?;
                }
            }
            ModuleVerdict::Rejected(rejection) => {
                eprintln!("  {} {}", "✗".red(), rejection.user_message());
                report.add_diagnostic(rejection.to_diagnostic());
            }
        }

        report.add_module_outcome(verdict.outcome());
    }

    report.save_to_file(output)?;
    eprintln!(
        "\n{} {} checked, {} ready, {} rejected. Report: {}",
        "Done:".cyan(),
        report.summary.modules_checked,
        report.summary.modules_rewritten.to_string().green(),
        report.summary.modules_rejected.to_string().red(),
        output.display()
    );

    if report.summary.modules_rejected > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Analyze command - run the source analyzer over extension source
fn analyze_command(
    config: &Config,
    paths: &[PathBuf],
    ruleset_path: &Path,
    ext: &str,
    output: &Path,
    markdown: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let ruleset = load_ruleset(ruleset_path, verbose)?;
    let analyzer = SourceAnalyzer::new(&ruleset.registry);

    let mut diagnostics = Vec::new();
    for file in discover_sources(paths, ext) {
        let source = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let name = file.display().to_string();

        for mut diagnostic in analyzer.analyze(&name, &source) {
            if config.is_suppressed(diagnostic.code) {
                continue;
            }
            diagnostic.severity = config
                .severity
                .get_severity(diagnostic.code, diagnostic.severity);
            diagnostics.push(diagnostic);
        }
    }

    for d in &diagnostics {
        let position = d
            .location
            .as_ref()
            .map(|l| {
                format!(
                    "{}:{}:{}",
                    l.file,
                    l.line.unwrap_or(0),
                    l.column.unwrap_or(0)
                )
            })
            .unwrap_or_default();
        let severity = match d.severity {
            modbridge_core::Severity::Error => "error".red(),
            modbridge_core::Severity::Warn => "warning".yellow(),
            modbridge_core::Severity::Info => "info".cyan(),
        };
        eprintln!("{position}: {severity} [{}]: {}", d.code, d.message);
    }

    let report = Report::from_diagnostics(diagnostics);
    report.save_to_file(output)?;
    if let Some(md_path) = markdown {
        std::fs::write(md_path, render_markdown(&report))?;
    }

    eprintln!(
        "\n{} {} diagnostics ({} errors, {} warnings). Report: {}",
        "Done:".cyan(),
        report.summary.total,
        report.summary.errors,
        report.summary.warnings,
        output.display()
    );

    if report.summary.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Inspect command - dump the scan result for one module
fn inspect_command(module: &Path, ruleset_path: &Path) -> Result<()> {
    let ruleset = load_ruleset(ruleset_path, false)?;
    let bytes = std::fs::read(module)
        .with_context(|| format!("failed to read module {}", module.display()))?;
    let image = modbridge_image::read_image(&bytes)
        .map_err(|e| anyhow::anyhow!("malformed module image: {e}"))?;

    let scanner = Scanner::new(
        &ruleset.registry,
        &ruleset.facades,
        &ruleset.api,
        ruleset.host.version,
    );
    let scan = scanner
        .scan(&image)
        .map_err(|e| anyhow::anyhow!("malformed module image: {e}"))?;

    println!("{} v{} ({} references)", image.name, image.version, scan.references.len());
    for reference in &scan.references {
        let status = match &reference.status {
            RefStatus::Matched { rule_id, .. } => format!("rule {rule_id}").cyan(),
            RefStatus::ResolvesInHost => "ok".green(),
            RefStatus::Unresolved => "UNRESOLVED".red(),
        };
        println!("  {:<14} {} [{}]", reference.site.to_string(), reference.identity, status);
    }

    Ok(())
}

/// Collect source files from explicit paths and walked directories
fn discover_sources(paths: &[PathBuf], ext: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file()
                    && entry.path().extension().and_then(|e| e.to_str()) == Some(ext)
                {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files
}

/// Render a short markdown summary of an analysis report
fn render_markdown(report: &Report) -> String {
    let mut md = String::new();
    md.push_str("# Modbridge analysis report\n\n");
    md.push_str(&format!(
        "- **Total**: {}\n- **Errors**: {}\n- **Warnings**: {}\n\n",
        report.summary.total, report.summary.errors, report.summary.warnings
    ));

    if !report.diagnostics.is_empty() {
        md.push_str("| Location | Rule | Severity | Message |\n");
        md.push_str("|----------|------|----------|--------|\n");
        for d in &report.diagnostics {
            let position = d
                .location
                .as_ref()
                .map(|l| format!("{}:{}", l.file, l.line.unwrap_or(0)))
                .unwrap_or_default();
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                position,
                d.code,
                d.severity,
                d.message.replace('|', "\\|")
            ));
        }
    }

    md
}

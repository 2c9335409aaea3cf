//! Conductor - task orchestration for delegated code generation
//!
//! Command-line front-end over the conductor library.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use conductor::analytics::reporting::percent;
use conductor::analytics::{EfficiencyTrend, MetricsCollector, ReportFormat, TokenTracker};
use conductor::pipeline::{Orchestrator, TaskOutcome};
use conductor::prompt::TemplateManager;
use conductor::quality::{Implementation, ImplementationComparator, QualityAnalysis, QualityAnalyzer};
use conductor::task::{Complexity, Task, TaskAnalyzer, TaskType};
use conductor::tools::default_profiles;
use conductor::{ConductorConfig, ConductorError};

#[derive(Parser)]
#[command(name = "conductor")]
#[command(version)]
#[command(about = "Delegate coding tasks to the best-suited tool and account for cost and quality", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Task fields shared by several commands.
#[derive(clap::Args)]
struct TaskArgs {
    /// Task description
    description: String,

    /// Declared task type: ui, logic, design, or unknown
    #[arg(short = 't', long = "type", default_value = "unknown")]
    task_type: TaskType,

    /// Declared complexity: low, medium, or high
    #[arg(short, long, default_value = "medium")]
    complexity: Complexity,

    /// Declared feature (repeatable)
    #[arg(short, long = "feature")]
    features: Vec<String>,
}

impl TaskArgs {
    fn into_task(self, id: String) -> Task {
        self.features.into_iter().fold(
            Task::new(id, self.description)
                .with_type(self.task_type)
                .with_complexity(self.complexity),
            |task, feature| task.with_feature(feature),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a task without delegating it
    Analyze {
        #[command(flatten)]
        task: TaskArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Process a task end to end
    Run {
        #[command(flatten)]
        task: TaskArgs,

        /// Task id (defaults to a random UUID)
        #[arg(long)]
        id: Option<String>,

        /// Preferred template type
        #[arg(long)]
        template: Option<String>,

        /// Number of ranked tools to try (overrides settings)
        #[arg(long)]
        tools: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect prompt templates
    Templates {
        #[command(subcommand)]
        action: TemplatesAction,
    },

    /// Score an implementation file
    Quality {
        /// File containing the implementation
        file: PathBuf,

        /// Description of the task the implementation solves
        #[arg(short, long, default_value = "")]
        description: String,

        /// Task type the implementation was written for
        #[arg(short = 't', long = "type", default_value = "ui")]
        task_type: TaskType,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare implementations from several tools
    Compare {
        /// Implementations as TOOL=FILE pairs
        #[arg(required = true, value_name = "TOOL=FILE")]
        implementations: Vec<String>,

        /// Description of the task the implementations solve
        #[arg(short, long, default_value = "")]
        description: String,

        /// Task type the implementations were written for
        #[arg(short = 't', long = "type", default_value = "ui")]
        task_type: TaskType,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show token efficiency statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a metrics report
    Report {
        /// Report format: json or markdown
        #[arg(short, long, default_value = "markdown")]
        format: ReportFormat,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TemplatesAction {
    /// List registered templates
    List {
        /// Only templates for this tool
        #[arg(long)]
        tool: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one template body
    Show {
        /// Tool name
        tool: String,

        /// Template type
        template_type: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "conductor=debug,info"
    } else {
        "conductor=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        let code = e
            .downcast_ref::<ConductorError>()
            .map_or(1, ConductorError::exit_code);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Resolve project path
    let project_path = cli.project.canonicalize().unwrap_or(cli.project.clone());

    if !project_path.exists() {
        anyhow::bail!("Project directory does not exist: {}", project_path.display());
    }

    let config = ConductorConfig::load(&project_path)?;

    match cli.command {
        Commands::Analyze { task, json } => {
            let task = task.into_task("analysis".to_string());
            task.validate()?;
            let analysis = TaskAnalyzer::new()
                .with_fallback_type(config.analyzer.fallback_type)
                .analyze(&task);

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                println!("\n{} Task Analysis", "Conductor:".cyan().bold());
                println!("{}", "─".repeat(40));
                println!("   Type: {}", analysis.task_type.to_string().green());
                println!("   Complexity: {}", analysis.complexity);
                println!(
                    "   Features: {}",
                    if analysis.features.is_empty() {
                        "none".dimmed().to_string()
                    } else {
                        analysis.features.join(", ")
                    }
                );
                println!("   Estimated lines: {}", analysis.estimated_lines);
                let budget = analysis.token_budget;
                println!(
                    "   Token budget: {} (analysis {}, implementation {}, review {})",
                    budget.total, budget.analysis, budget.implementation, budget.review
                );
            }
        }

        Commands::Run {
            task,
            id,
            template,
            tools,
            json,
        } => {
            let mut config = config;
            if let Some(n) = tools {
                config.tool_attempts = n;
            }
            let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let mut task = task.into_task(id);
            if let Some(template) = template {
                task = task.with_template(template);
            }

            let orchestrator = Orchestrator::from_config(&config, &project_path)?;
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let outcome = orchestrator.process_task(task, &cancel).await?;
            orchestrator.save().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
            if let TaskOutcome::Failed(failure) = &outcome {
                std::process::exit(if failure.code == "CANCELLED" { 4 } else { 3 });
            }
        }

        Commands::Templates { action } => {
            let manager = load_templates(&config, &project_path)?;
            match action {
                TemplatesAction::List { tool, json } => {
                    let templates = manager.list(tool.as_deref());
                    if json {
                        println!("{}", serde_json::to_string_pretty(&templates)?);
                    } else {
                        println!("\n{} Templates", "Conductor:".cyan().bold());
                        println!("{}", "─".repeat(40));
                        for template in templates {
                            println!(
                                "   {:<18} {:<12} {} placeholders",
                                template.tool,
                                template.template_type,
                                template.placeholders().len()
                            );
                        }
                    }
                }
                TemplatesAction::Show {
                    tool,
                    template_type,
                } => {
                    let template = manager.template(&tool, &template_type).ok_or_else(|| {
                        ConductorError::TemplateNotFound {
                            tool: tool.clone(),
                            template_type: template_type.clone(),
                        }
                    })?;
                    println!("{}", template.body);
                    if !template.defaults.is_empty() {
                        println!("\n{}", "Defaults:".bold());
                        for (name, value) in &template.defaults {
                            println!("   {} = {}", name, value);
                        }
                    }
                }
            }
        }

        Commands::Quality {
            file,
            description,
            task_type,
            json,
        } => {
            let content = read_implementation(&file)?;
            let task = Task::new("quality", description).with_type(task_type);
            let analysis = QualityAnalyzer::from_mode(config.scoring).analyze_quality(&content, &task);

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_quality(&analysis);
            }
        }

        Commands::Compare {
            implementations,
            description,
            task_type,
            json,
        } => {
            let implementations = implementations
                .iter()
                .map(|pair| parse_implementation(pair))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let task = Task::new("compare", description).with_type(task_type);
            let comparator = ImplementationComparator::new(QualityAnalyzer::from_mode(config.scoring));
            let report = comparator.compare(&implementations, &task)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\n{} Comparison", "Conductor:".cyan().bold());
                println!("{}", "─".repeat(40));
                for entry in &report.ranked {
                    println!("   {}. {:<18} {:.1}/10", entry.rank, entry.tool, entry.overall_score);
                }
                println!(
                    "\n   Best tool: {} ({:.1}/10)",
                    report.findings.best_tool.green().bold(),
                    report.findings.best_score
                );
                if !report.findings.recommendations.is_empty() {
                    println!("\n{}", "Recommendations:".bold());
                    for recommendation in &report.findings.recommendations {
                        println!("   - {}", recommendation);
                    }
                }
            }
        }

        Commands::Stats { json } => {
            let tracker = TokenTracker::open(&project_path)?;
            let stats = tracker.get_stats();

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("\n{} Token Efficiency", "Conductor:".cyan().bold());
                println!("{}", "─".repeat(40));
                println!("   Tasks: {} ({} completed)", stats.total_tasks, stats.completed_tasks);
                println!("   Direct tokens: {}", stats.total_direct);
                println!("   Delegated tokens: {}", stats.total_delegated);
                println!("   Overall gain: {:.2}%", stats.overall_gain);
                if let Some(quality) = stats.average_quality {
                    println!("   Average quality: {:.1}/10", quality);
                }
                match &stats.trend {
                    EfficiencyTrend::InsufficientData { completed } => {
                        println!("   Trend: {} ({} completed tasks)", "insufficient data".dimmed(), completed);
                    }
                    EfficiencyTrend::Trend { direction, change, .. } => {
                        println!("   Trend: {} ({:+.1} points)", direction, change);
                    }
                }
                for (tool, totals) in &stats.by_tool {
                    println!(
                        "   {:<18} {} attempts, {} selected, {} tokens",
                        tool, totals.attempts, totals.selected, totals.total_tokens
                    );
                }
            }
        }

        Commands::Report { format, output } => {
            let collector = MetricsCollector::open(&project_path)?;
            let report = collector.generate_report(format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, report)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    println!("{} Report written to {}", "OK".green().bold(), path.display());
                }
                None => println!("{}", report),
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Validate => {
                config.validate()?;
                println!("{} Configuration is valid", "OK".green().bold());
            }
        },
    }

    Ok(())
}

fn load_templates(config: &ConductorConfig, project_path: &Path) -> anyhow::Result<TemplateManager> {
    let names: Vec<String> = default_profiles().into_iter().map(|p| p.name).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut manager = TemplateManager::with_defaults(&names);
    if let Some(dir) = config.templates_path(project_path) {
        if dir.is_dir() {
            manager.load_from_dir(&dir)?;
        }
    }
    Ok(manager)
}

fn read_implementation(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_implementation(pair: &str) -> anyhow::Result<Implementation> {
    let (tool, file) = pair
        .split_once('=')
        .ok_or_else(|| ConductorError::validation("implementations", format!("expected TOOL=FILE, got '{}'", pair)))?;
    Ok(Implementation::new(tool, read_implementation(Path::new(file))?))
}

fn print_quality(analysis: &QualityAnalysis) {
    println!("\n{} Quality Analysis", "Conductor:".cyan().bold());
    println!("{}", "─".repeat(40));
    let score = format!("{:.1}/10", analysis.overall_score);
    let score = if analysis.overall_score >= 8.0 {
        score.green()
    } else if analysis.overall_score >= 6.0 {
        score.yellow()
    } else {
        score.red()
    };
    println!("   Overall: {}", score.bold());

    for (metric, value) in &analysis.per_metric {
        println!("   {:<24} {:.1}", metric.label(), value.raw_score);
    }
    for (title, items) in [
        ("Strengths:", &analysis.strengths),
        ("Weaknesses:", &analysis.weaknesses),
        ("Suggestions:", &analysis.suggestions),
    ] {
        if !items.is_empty() {
            println!("\n{}", title.bold());
            for item in items {
                println!("   - {}", item);
            }
        }
    }
}

fn print_outcome(outcome: &TaskOutcome) {
    match outcome {
        TaskOutcome::Completed(report) => {
            println!(
                "\n{} Task {} completed with {}",
                "OK".green().bold(),
                report.task_id,
                report.selected_tool.bold()
            );
            println!("{}", "─".repeat(40));
            println!(
                "   Template: {}",
                report.template_type.as_deref().unwrap_or("none")
            );
            println!(
                "   Tokens: {} direct estimate, {} delegated ({} spent across attempts)",
                report.efficiency.direct, report.efficiency.delegated, report.tokens_spent
            );
            if report.efficiency.is_defined() {
                println!(
                    "   Efficiency gain: {} (ratio {:.2}x)",
                    percent(report.efficiency.efficiency_gain / 100.0),
                    report.efficiency.efficiency_ratio
                );
            }
            print_quality(&report.quality);
            println!("\n{}", report.implementation);
        }
        TaskOutcome::Failed(failure) => {
            eprintln!(
                "\n{} Task {} failed during {}: {}",
                "FAILED".red().bold(),
                failure.task_id,
                failure.stage,
                failure.message
            );
            eprintln!("   Tokens spent: {}", failure.tokens_spent);
        }
    }
}

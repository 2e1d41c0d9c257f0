//! Switchboard CLI - offline worker selection and profile inspection

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use switchboard_core::Error;
use switchboard_core::classifier::{DomainClassifier, KeywordClassifier};
use switchboard_core::config::Config;
use switchboard_core::learning::StaticLearningSignal;
use switchboard_core::profiles::{ProfileCatalog, WeightProfile, WeightProfileStore};
use switchboard_core::registry::{Capability, Certification, RegistrySnapshot, SharedRegistry};
use switchboard_core::selection::{
    Dimension, Domain, OptimizationPreference, RequestContext, SelectionEngine, SelectionResult,
};
use tracing::debug;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(author, version, about = "Weighted multi-dimensional worker selection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a worker for a request
    Select(SelectArgs),

    /// Inspect weight profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Classify request text into a domain
    Classify {
        /// Request text
        text: String,
        /// Explicit task-type tag
        #[arg(long)]
        task_type: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct SelectArgs {
    /// Registry snapshot JSON (a worker array or a snapshot object)
    #[arg(short, long)]
    workers: PathBuf,
    /// Request context JSON; flags below override its fields
    #[arg(short, long)]
    request: Option<PathBuf>,
    /// Learning table JSON
    #[arg(long)]
    learning: Option<PathBuf>,
    /// Explicit weight profile id
    #[arg(short, long)]
    profile: Option<String>,
    /// Optimization preference (balanced, cost, quality, latency)
    #[arg(short, long)]
    optimize: Option<String>,
    /// Request domain
    #[arg(short, long)]
    domain: Option<String>,
    /// Request content used for domain detection
    #[arg(short, long)]
    content: Option<String>,
    /// Explicit task-type tag
    #[arg(long)]
    task_type: Option<String>,
    /// Required capability (repeatable)
    #[arg(long = "capability")]
    capabilities: Vec<String>,
    /// Required certification (repeatable)
    #[arg(long = "certification")]
    certifications: Vec<String>,
    /// Maximum estimated request price in USD
    #[arg(long)]
    max_cost: Option<f64>,
    /// Minimum worker quality (0-100)
    #[arg(long)]
    min_quality: Option<f64>,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List all weight profiles
    List,
    /// Show one profile's weights and constraints
    Show { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("switchboard=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Select(args) => cmd_select(args, cli.format, cli.quiet).await,
        Commands::Profiles { action } => cmd_profiles(action, cli.format),
        Commands::Classify { text, task_type } => {
            cmd_classify(&text, task_type.as_deref(), cli.format)
        }
        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Library error with its code and remediation hint
fn describe(err: Error) -> anyhow::Error {
    let mut message = format!("[{}] {}", err.code(), err);
    if let Some(hint) = err.suggestion() {
        message.push_str(&format!("\n  Hint: {}", hint));
    }
    anyhow::anyhow!(message)
}

fn load_catalog(config: &Config) -> anyhow::Result<ProfileCatalog> {
    let catalog = match &config.profiles.catalog_path {
        Some(path) => ProfileCatalog::builtin_with_overrides(path),
        None => ProfileCatalog::builtin(),
    };
    catalog.map_err(describe)
}

fn read_request(path: &Path) -> anyhow::Result<RequestContext> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading request file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("parsing request file {}", path.display()))
}

fn build_request(args: &SelectArgs) -> anyhow::Result<RequestContext> {
    let mut request = match &args.request {
        Some(path) => read_request(path)?,
        None => RequestContext::new(),
    };

    if let Some(profile) = &args.profile {
        request = request.with_profile(profile.clone());
    }
    if let Some(optimize) = &args.optimize {
        let preference: OptimizationPreference =
            optimize.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        request = request.with_optimization(preference);
    }
    if let Some(domain) = &args.domain {
        let domain: Domain = domain.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        request = request.with_domain(domain);
    }
    if let Some(content) = &args.content {
        request = request.with_content(content.clone());
    }
    if let Some(task_type) = &args.task_type {
        request = request.with_task_type(task_type.clone());
    }
    if !args.capabilities.is_empty() {
        let capabilities = args
            .capabilities
            .iter()
            .map(|c| c.parse::<Capability>())
            .collect::<Result<Vec<_>, String>>()
            .map_err(|e| anyhow::anyhow!(e))?;
        request = request.with_capabilities(capabilities);
    }
    if !args.certifications.is_empty() {
        let certifications = args
            .certifications
            .iter()
            .map(|c| c.parse::<Certification>())
            .collect::<Result<Vec<_>, String>>()
            .map_err(|e| anyhow::anyhow!(e))?;
        request = request.with_certifications(certifications);
    }
    if let Some(max_cost) = args.max_cost {
        request = request.with_max_cost(max_cost);
    }
    if let Some(min_quality) = args.min_quality {
        request = request.with_min_quality(min_quality);
    }
    Ok(request)
}

async fn cmd_select(args: SelectArgs, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let snapshot = RegistrySnapshot::from_json_file(&args.workers).map_err(describe)?;
    debug!(
        workers = snapshot.len(),
        version = snapshot.version,
        "Loaded registry snapshot"
    );
    let request = build_request(&args)?;

    let mut builder = SelectionEngine::builder()
        .profiles(Arc::new(load_catalog(&config)?))
        .registry(Arc::new(SharedRegistry::new(snapshot)))
        .config(config);
    if let Some(path) = &args.learning {
        let learning = StaticLearningSignal::from_json_file(path).map_err(describe)?;
        builder = builder.learning(Arc::new(learning));
    }
    let engine = builder.build().map_err(describe)?;

    let result = engine.select(&request).await.map_err(describe)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text if quiet => println!("{}", result.primary),
        OutputFormat::Text => print_selection(&result),
    }
    Ok(())
}

fn print_selection(result: &SelectionResult) {
    println!("Primary:   {} (score {:.2})", result.primary, result.composite_score);
    if result.fallbacks.is_empty() {
        println!("Fallbacks: (none)");
    } else {
        println!("Fallbacks: {}", result.fallbacks.join(", "));
    }
    println!("Profile:   {} ({})", result.profile.id, result.profile.name);
    println!(
        "Eligible:  {} of {}",
        result.metadata.candidates_eligible, result.metadata.candidates_total
    );
    if result.metadata.partial_scoring {
        println!("Partial scoring: yes");
    }
    if !result.metadata.timed_out_workers.is_empty() {
        println!("Timed out: {}", result.metadata.timed_out_workers.join(", "));
    }
    if !result.metadata.failed_workers.is_empty() {
        println!("Failed:    {}", result.metadata.failed_workers.join(", "));
    }
    println!();
    println!("Scores:");
    for (dimension, score) in result.scores.iter() {
        println!(
            "  {:<13} {:>6.1}  (weight {:.2})",
            dimension,
            score,
            result.profile.weights.get(dimension)
        );
    }
    println!();
    println!("{}", result.justification);
}

fn cmd_profiles(action: ProfileAction, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let catalog = load_catalog(&config)?;

    match action {
        ProfileAction::List => match format {
            OutputFormat::Json => {
                let profiles: Vec<&WeightProfile> = catalog.all().map(|p| p.as_ref()).collect();
                println!("{}", serde_json::to_string_pretty(&profiles)?);
            }
            OutputFormat::Text => {
                println!("Weight Profiles:");
                for profile in catalog.all() {
                    let marker = if profile.id == catalog.default_profile().id {
                        " (default)"
                    } else {
                        ""
                    };
                    println!("  {:<18} {}{}", profile.id, profile.name, marker);
                }
            }
        },
        ProfileAction::Show { id } => {
            let profile = catalog
                .get_profile(&id)
                .ok_or_else(|| describe(Error::ProfileNotFound(id.clone())))?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*profile)?),
                OutputFormat::Text => print_profile(&profile, catalog.domain_for_profile(&id)),
            }
        }
    }
    Ok(())
}

fn print_profile(profile: &WeightProfile, domain: Option<Domain>) {
    println!("{} ({})", profile.name, profile.id);
    if !profile.description.is_empty() {
        println!("  {}", profile.description);
    }
    if let Some(domain) = domain {
        println!("  Domain: {}", domain);
    }
    println!();
    println!("Weights:");
    for dimension in Dimension::ALL {
        println!("  {:<13} {:.2}", dimension, profile.weights.get(dimension));
    }
    println!();
    println!("Constraints:");
    match profile.min_quality {
        Some(floor) => println!("  Minimum quality: {:.0}", floor),
        None => println!("  Minimum quality: none"),
    }
    if profile.required_certifications.is_empty() {
        println!("  Certifications:  none");
    } else {
        let certifications: Vec<String> = profile
            .required_certifications
            .iter()
            .map(ToString::to_string)
            .collect();
        println!("  Certifications:  {}", certifications.join(", "));
    }
    if let Some(class) = profile.forced_class {
        println!("  Worker class:    {}", class);
    }
    println!(
        "  Verification:    {} (threshold {:.2})",
        if profile.requires_verification { "required" } else { "optional" },
        profile.verification_threshold
    );
    println!(
        "  Citations:       {}",
        if profile.requires_citation { "required" } else { "optional" }
    );
}

fn cmd_classify(text: &str, task_type: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let classification = KeywordClassifier::new().classify(Some(text), task_type);
    let accepted = classification.confidence >= config.classifier.confidence_threshold;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "domain": classification.domain,
                "confidence": classification.confidence,
                "accepted": accepted,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!(
                "Domain: {} (confidence {:.2})",
                classification.domain, classification.confidence
            );
            if !accepted {
                println!(
                    "Below threshold {:.2}; the default profile would be used",
                    config.classifier.confidence_threshold
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

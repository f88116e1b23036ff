// promptforge — Model-targeted prompt assembly for code-generation agents
// License: Apache-2.0

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use promptforge::artifact::{AgentGuidelines, ArtifactKind, BusinessGoals, SystemDescription};
use promptforge::config::Config;
use promptforge::extract::codebase::CodebaseIndexer;
use promptforge::extract::{self, infra};
use promptforge::pipeline::{BuildRequest, PromptBuilder};
use promptforge::store::ArtifactStore;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOGO: &str = "🔨";

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "promptforge",
    about = "promptforge — Context selection and prompt assembly for code-generation LLMs",
    version
)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,
    /// Resources directory (overrides resources.dir)
    #[arg(short, long, global = true)]
    resources: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the resources directory and a default config
    Init,
    /// Store business goals from a YAML file
    SetBusinessGoals { file: PathBuf },
    /// Store agent guidelines from a YAML file
    SetGuidelines { file: PathBuf },
    /// Store the system description (IO examples, components, infrastructure) from YAML
    SetSystem { file: PathBuf },
    /// Scrape infrastructure files and merge the sections into the store
    IndexInfra {
        /// Terraform state file (terraform.tfstate)
        #[arg(long)]
        tfstate: Option<PathBuf>,
        /// GitLab CI file (.gitlab-ci.yml)
        #[arg(long)]
        gitlab_ci: Option<PathBuf>,
        #[arg(long)]
        dockerfile: Option<PathBuf>,
        /// docker-compose file
        #[arg(long)]
        compose: Option<PathBuf>,
        /// ECS task definition (JSON)
        #[arg(long)]
        ecs_task_def: Option<PathBuf>,
        /// CloudFormation template (YAML or JSON)
        #[arg(long)]
        cloudformation: Option<PathBuf>,
    },
    /// Index source files into components
    IndexCodebase {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Root the component paths are relative to (default: current directory)
        #[arg(long)]
        project_root: Option<PathBuf>,
        /// Group by directory only, without the judgment service
        #[arg(long)]
        no_judge: bool,
    },
    /// Index business documents (markdown, text, csv)
    IndexDocs {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Build a prompt from a feature YAML file
    Prompt {
        file: PathBuf,
        /// Print the full build metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stored artifact, or list the identifiers of a kind
    Show {
        kind: String,
        identifier: Option<String>,
    },
    /// Show status of configuration and resources
    Status,
    /// Show version information
    Version,
}

/// A feature file: the build request plus where to save the result.
#[derive(Deserialize)]
struct FeatureFile {
    #[serde(flatten)]
    request: BuildRequest,
    #[serde(default)]
    output_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    promptforge::logger::init();

    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref());
    if let Some(dir) = cli.resources {
        cfg.resources.dir = dir;
    }

    let result = match cli.command {
        Commands::Init => init_cmd(&cfg, cli.config.as_deref()).await,
        Commands::SetBusinessGoals { file } => set_business_goals_cmd(&cfg, &file).await,
        Commands::SetGuidelines { file } => set_guidelines_cmd(&cfg, &file).await,
        Commands::SetSystem { file } => set_system_cmd(&cfg, &file).await,
        Commands::IndexInfra {
            tfstate,
            gitlab_ci,
            dockerfile,
            compose,
            ecs_task_def,
            cloudformation,
        } => {
            let sources = InfraSources {
                tfstate,
                gitlab_ci,
                dockerfile,
                compose,
                ecs_task_def,
                cloudformation,
            };
            index_infra_cmd(&cfg, sources).await
        }
        Commands::IndexCodebase {
            paths,
            project_root,
            no_judge,
        } => index_codebase_cmd(&cfg, &paths, project_root, no_judge).await,
        Commands::IndexDocs { paths } => index_docs_cmd(&cfg, &paths).await,
        Commands::Prompt { file, json } => prompt_cmd(&cfg, &file, json).await,
        Commands::Show { kind, identifier } => show_cmd(&cfg, &kind, identifier.as_deref()).await,
        Commands::Status => status_cmd(&cfg, cli.config.as_deref()).await,
        Commands::Version => {
            version_cmd();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} Error: {:#}", LOGO, e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Setup commands
// ---------------------------------------------------------------------------

async fn init_cmd(cfg: &Config, config_path: Option<&str>) -> anyhow::Result<()> {
    println!("{} Initializing promptforge...\n", LOGO);

    let config_path = resolve_config_path(config_path);
    if !config_path.exists() {
        Config::default().save(&config_path)?;
        println!("  ✅ Config created at {}", config_path.display());
    } else {
        println!("  ⏭️  Config already exists at {}", config_path.display());
    }

    let store = open_store(cfg)?;
    store.init().await?;
    println!("  ✅ Resources directory at {}", store.root().display());

    println!("\n{} Setup complete!", LOGO);
    println!("\nNext steps:");
    println!("  1. Add an API key to {} (optional, enables classification)", config_path.display());
    println!("  2. Run: promptforge set-business-goals goals.yaml");
    println!("  3. Run: promptforge prompt feature.yaml");
    Ok(())
}

async fn set_business_goals_cmd(cfg: &Config, file: &Path) -> anyhow::Result<()> {
    let goals: BusinessGoals = read_yaml(file)?;
    open_store(cfg)?.save_business_goals(&goals).await?;
    println!("{} Business goals saved ({} constraints)", LOGO, goals.external_constraints.len());
    Ok(())
}

async fn set_guidelines_cmd(cfg: &Config, file: &Path) -> anyhow::Result<()> {
    let guidelines: AgentGuidelines = read_yaml(file)?;
    open_store(cfg)?.save_agent_guidelines(&guidelines).await?;
    println!(
        "{} Agent guidelines saved ({} guardrails, {} best practices, {} coding standards)",
        LOGO,
        guidelines.guardrails.len(),
        guidelines.best_practices.len(),
        guidelines.coding_standards.len()
    );
    Ok(())
}

async fn set_system_cmd(cfg: &Config, file: &Path) -> anyhow::Result<()> {
    let system: SystemDescription = read_yaml(file)?;
    open_store(cfg)?.save_system_description(&system).await?;
    println!(
        "{} System description saved ({} IO examples, {} components, {} infrastructure sections)",
        LOGO,
        system.io_examples.len(),
        system.components.len(),
        system.infrastructure.sections.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Indexing commands
// ---------------------------------------------------------------------------

struct InfraSources {
    tfstate: Option<PathBuf>,
    gitlab_ci: Option<PathBuf>,
    dockerfile: Option<PathBuf>,
    compose: Option<PathBuf>,
    ecs_task_def: Option<PathBuf>,
    cloudformation: Option<PathBuf>,
}

async fn index_infra_cmd(cfg: &Config, src: InfraSources) -> anyhow::Result<()> {
    let given = [&src.tfstate, &src.gitlab_ci, &src.dockerfile, &src.compose, &src.ecs_task_def, &src.cloudformation];
    if given.iter().all(|p| p.is_none()) {
        bail!(
            "nothing to index: pass at least one of --tfstate, --gitlab-ci, --dockerfile, --compose, \
             --ecs-task-def, --cloudformation"
        );
    }

    let mut sections = Vec::new();
    if let Some(path) = &src.tfstate {
        sections.extend(infra::scrape_terraform_state(path).await?);
    }
    if let Some(path) = &src.gitlab_ci {
        sections.push(infra::scrape_gitlab_ci(path).await?);
    }
    if let Some(path) = &src.dockerfile {
        sections.push(infra::scrape_dockerfile(path).await?);
    }
    if let Some(path) = &src.compose {
        sections.push(infra::scrape_compose(path).await?);
    }
    if let Some(path) = &src.ecs_task_def {
        sections.push(infra::scrape_ecs_task_definition(path).await?);
    }
    if let Some(path) = &src.cloudformation {
        sections.push(infra::scrape_cloudformation(path).await?);
    }

    for section in &sections {
        println!("  ✅ {} ({})", section.title, section.section_type);
    }
    let merged = open_store(cfg)?.merge_infrastructure_sections(sections).await?;
    println!("\n{} {} infrastructure sections stored", LOGO, merged.sections.len());
    Ok(())
}

async fn index_codebase_cmd(
    cfg: &Config,
    paths: &[PathBuf],
    project_root: Option<PathBuf>,
    no_judge: bool,
) -> anyhow::Result<()> {
    let root = match project_root {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    let mut indexer = CodebaseIndexer::new(&root);
    if !no_judge {
        if let Some(judge) = PromptBuilder::from_config(cfg)?.judge() {
            indexer = indexer.with_judge(judge, Duration::from_secs(cfg.judge.timeout_secs));
        }
    }

    let index = indexer.index(paths).await?;
    for component in &index.components {
        println!("  ✅ {} ({} files)", component.name, component.file_paths.len());
    }
    open_store(cfg)?.save_component_index(&index).await?;
    println!("\n{} {} components indexed", LOGO, index.components.len());
    Ok(())
}

async fn index_docs_cmd(cfg: &Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let mut failures = 0;
    for path in paths {
        match extract::index_document(path).await {
            Ok(doc) => {
                let name = doc.filename.clone();
                let chars = doc.extracted_markdown.chars().count();
                store.save_business_context_document(doc).await?;
                println!("  ✅ {} ({} chars)", name, chars);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping document");
                println!("  ❌ {}: {}", path.display(), e);
                failures += 1;
            }
        }
    }
    if failures == paths.len() {
        bail!("no documents indexed");
    }
    println!("\n{} {} of {} documents indexed", LOGO, paths.len() - failures, paths.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Prompt command
// ---------------------------------------------------------------------------

async fn prompt_cmd(cfg: &Config, file: &Path, json: bool) -> anyhow::Result<()> {
    if let Err(e) = cfg.validate() {
        bail!("configuration error: {}", e);
    }
    let feature: FeatureFile = read_yaml(file)?;
    let builder = PromptBuilder::from_config(cfg)?;
    let output = builder.build_prompt(feature.request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output.metadata)?);
    } else {
        println!("{}", output.prompt);
        println!("\n---");
        let meta = &output.metadata;
        println!("{} Profile:    {} (model: {})", LOGO, meta.profile, meta.model);
        println!("   Selection:  {:?}, {} artifacts", meta.selection_source, output.selection.selected_count());
        if let Some(classification) = &output.classification {
            println!(
                "   Category:   {:?}, complexity {:?}",
                classification.feature_category, classification.complexity
            );
            if !classification.reasoning.is_empty() {
                println!("   Reasoning:  {}", classification.reasoning);
            }
        }
        if let Some(reason) = &meta.fallback_reason {
            println!("   Fallback:   {}", reason);
        }
        if !meta.borderline.is_empty() {
            println!("   Borderline: {}", meta.borderline.join(", "));
        }
        println!(
            "   Classified: {}  Optimized: {}",
            if meta.classified { "✅" } else { "❌" },
            if meta.optimized { "✅" } else { "❌" }
        );
        if let Some(reason) = &meta.optimization_failure {
            println!("   Optimizer:  {}", reason);
        }
    }

    if let Some(path) = &feature.output_file {
        let saved = if output.optimized {
            tokio::fs::write(path, &output.prompt).await
        } else {
            output.assembled.save(path).await
        };
        saved.with_context(|| format!("failed to write {}", path.display()))?;
        println!("{} Prompt saved to {}", LOGO, path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Show / status / version
// ---------------------------------------------------------------------------

async fn show_cmd(cfg: &Config, kind: &str, identifier: Option<&str>) -> anyhow::Result<()> {
    let Some(kind) = ArtifactKind::parse(kind) else {
        let kinds: Vec<_> = ArtifactKind::ALL.iter().map(|k| k.as_str()).collect();
        bail!("unknown artifact kind '{}' (expected one of: {})", kind, kinds.join(", "));
    };
    let store = open_store(cfg)?;

    if kind.is_singleton() {
        let value = match kind {
            ArtifactKind::BusinessGoals => serde_json::to_value(store.load_business_goals().await?)?,
            ArtifactKind::AgentGuidelines => serde_json::to_value(store.load_agent_guidelines().await?)?,
            _ => serde_json::to_value(
                store
                    .load_system_description()
                    .await?
                    .map(|s| s.io_examples)
                    .unwrap_or_default(),
            )?,
        };
        if value.is_null() {
            println!("{} No {} stored", LOGO, kind);
        } else {
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        return Ok(());
    }

    let Some(identifier) = identifier else {
        let manifest = store.manifest().await?;
        let ids: Vec<_> = manifest.entries_of(kind).map(|e| e.identifier.as_str()).collect();
        if ids.is_empty() {
            println!("{} No {} artifacts stored", LOGO, kind);
        }
        for id in ids {
            println!("  {}", id);
        }
        return Ok(());
    };

    let entry = store.require(kind, identifier).await?;
    match kind {
        ArtifactKind::BusinessContext => {
            let doc = store.load_business_context_document(identifier).await?;
            println!("{} {} ({}, indexed {})\n", LOGO, doc.filename, doc.file_type, doc.indexed_at);
            println!("{}", doc.extracted_markdown);
        }
        ArtifactKind::Component => {
            let manifest = store.manifest().await?;
            if let Some(component) = manifest.component(identifier) {
                println!("{}", serde_json::to_string_pretty(component)?);
            }
        }
        ArtifactKind::InfrastructureSection => {
            let manifest = store.manifest().await?;
            if let Some(section) = manifest.section(identifier) {
                println!("{} {} ({})\n", LOGO, section.title, section.section_type);
                println!("{}", section.content);
            }
        }
        _ => println!("{}", entry.text_excerpt),
    }
    Ok(())
}

async fn status_cmd(cfg: &Config, config_path: Option<&str>) -> anyhow::Result<()> {
    println!("{} promptforge Status\n", LOGO);

    let config_path = resolve_config_path(config_path);
    if config_path.exists() {
        println!("  Config:     ✅ {}", config_path.display());
    } else {
        println!("  Config:     ❌ Not found (run 'promptforge init')");
    }

    let store = open_store(cfg)?;
    if store.exists() {
        println!("  Resources:  ✅ {}", store.root().display());
        let manifest = store.manifest().await?;
        for kind in ArtifactKind::ALL {
            println!("              {:<24} {}", kind.as_str(), manifest.entries_of(kind).count());
        }
    } else {
        println!("  Resources:  ❌ {} (not created)", store.root().display());
    }

    println!("  Judge:      {}", cfg.judge.model);
    match cfg.resolve_provider() {
        Some((_, _, name)) => println!("  Provider:   ✅ {} (key configured)", name),
        None => println!("  Provider:   ❌ No API key found (keyword selection only)"),
    }
    println!(
        "  Pipeline:   classifier {}, optimizer {}, profile {}",
        on_off(cfg.pipeline.use_classifier),
        on_off(cfg.pipeline.use_optimizer),
        cfg.pipeline.default_model_profile
    );
    Ok(())
}

fn version_cmd() {
    println!("{} promptforge v{}", LOGO, promptforge::VERSION);
    println!("  Context selection and prompt assembly for code-generation LLMs");
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_config_path(path: Option<&str>) -> PathBuf {
    match path {
        Some(p) => PathBuf::from(p),
        None => Config::default_path().unwrap_or_else(|_| PathBuf::from("config.json")),
    }
}

fn load_config(path: Option<&str>) -> Config {
    Config::load(&resolve_config_path(path)).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}, using defaults", e);
        Config::default()
    })
}

fn open_store(cfg: &Config) -> anyhow::Result<ArtifactStore> {
    Ok(ArtifactStore::new(cfg.resources_path()?))
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("invalid YAML in {}", path.display()))
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

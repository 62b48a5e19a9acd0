use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    clap::{Parser, Subcommand},
    skillery_catalog::{
        aggregate::Aggregator,
        build,
        providers::ProviderRegistry,
        state::StateStore,
    },
    skillery_skills::{agents, export, install, registry, validate, version},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

/// Catalog consumed by search/info/install when no override is given.
const DEFAULT_CATALOG_URL: &str =
    "https://raw.githubusercontent.com/skillery-org/skillery/main/catalog/catalog.min.json";

#[derive(Parser)]
#[command(name = "skillery", about = "Agent-skill package manager and catalog aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom data directory (state, caches).
    #[arg(long, global = true, env = "SKILLERY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Catalog URL override.
    #[arg(long, global = true, env = "SKILLERY_CATALOG_URL")]
    catalog_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every provider and build the catalog.
    Aggregate {
        /// Only re-fetch providers whose head commit moved.
        #[arg(long)]
        incremental: bool,
        /// Directory receiving catalog.json / catalog.min.json.
        #[arg(long, default_value = "catalog")]
        output_dir: PathBuf,
    },
    /// Search the catalog.
    Search { query: String },
    /// Show details for one skill.
    Info {
        /// Skill id (provider/name).
        id: String,
    },
    /// Install a skill into an agent's skills directory.
    Install {
        /// Skill id, optionally with a version (provider/name@1.2.0).
        spec: String,
        /// Target agent (auto, claude, copilot, codex, cursor, generic).
        #[arg(long)]
        agent: Option<String>,
        /// Install into the current project instead of the home directory.
        #[arg(long)]
        project: bool,
    },
    /// Remove an installed skill.
    Uninstall {
        /// Skill id (provider/name).
        id: String,
        /// Target agent (auto, claude, copilot, codex, cursor, generic).
        #[arg(long)]
        agent: Option<String>,
        /// Look in the current project instead of the home directory.
        #[arg(long)]
        project: bool,
    },
    /// Re-install skills whose catalog entry is newer than the local copy.
    Update {
        /// Apply the updates. Without this flag the command only lists them.
        #[arg(long)]
        yes: bool,
    },
    /// List installed skills across all known locations.
    List,
    /// Show the effective configuration, or write it out with --init.
    Config {
        /// Write the effective config to the standard config path.
        #[arg(long)]
        init: bool,
    },
    /// Validate a local skill directory before publishing.
    Validate { dir: PathBuf },
    /// Export installed skills as a combined instruction file.
    Export {
        /// Output format: claude or copilot.
        #[arg(long)]
        format: String,
        /// File to write.
        #[arg(long)]
        output: PathBuf,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = &cli.data_dir {
        skillery_config::set_data_dir(dir.clone());
    }
    let config = skillery_config::discover_and_load();

    match &cli.command {
        Commands::Aggregate {
            incremental,
            output_dir,
        } => run_aggregate(&config, *incremental, output_dir).await,
        Commands::Search { query } => {
            let catalog = catalog_client(&cli).load().await?;
            let results = registry::search_skills(&catalog, query);
            if results.is_empty() {
                println!("No skills matched '{query}'.");
                return Ok(());
            }
            for skill in results {
                println!(
                    "{:<40} {:>3}  {}",
                    skill.record.id,
                    skill.record.quality_score,
                    truncate(&skill.record.description, 70)
                );
            }
            Ok(())
        },
        Commands::Info { id } => {
            let catalog = catalog_client(&cli).load().await?;
            let Some(skill) = registry::find_skill(&catalog, id) else {
                bail!("skill '{id}' not found in catalog");
            };
            print_info(skill);
            Ok(())
        },
        Commands::Install {
            spec,
            agent,
            project,
        } => {
            let (id, requested) = version::parse_skill_spec(spec);
            let catalog = catalog_client(&cli).load().await?;
            let Some(skill) = registry::find_skill(&catalog, id) else {
                bail!("skill '{id}' not found in catalog");
            };
            if let Some(requested) = requested {
                tracing::warn!(
                    %requested,
                    "catalog entries are unversioned, installing the latest published revision"
                );
            }
            let target = skill_path(&config, agent.as_deref(), &skill.record.name, *project)?;
            let receipt = install::install_skill(skill, &target).await?;
            println!("Installed {} to {}", receipt.id, target.display());
            Ok(())
        },
        Commands::Uninstall { id, agent, project } => {
            let name = id.rsplit('/').next().unwrap_or(id);
            let target = skill_path(&config, agent.as_deref(), name, *project)?;
            install::uninstall_skill(&target).await?;
            println!("Removed {id}");
            Ok(())
        },
        Commands::Update { yes } => {
            let locations = agents::install_locations(&std::env::current_dir()?, &home_dir()?);
            let installed = install::list_installed(&locations);
            if installed.is_empty() {
                println!("No skills installed.");
                return Ok(());
            }
            let catalog = catalog_client(&cli).load().await?;
            let updates = install::find_updates(&installed, &catalog);
            if updates.is_empty() {
                println!("All skills are up to date.");
                return Ok(());
            }
            if !*yes {
                println!("Updates available:");
                for u in &updates {
                    println!("  {:<40} ({})", u.skill.record.id, u.installed.location);
                }
                println!("Re-run with --yes to install them.");
                return Ok(());
            }
            for u in &updates {
                install::uninstall_skill(&u.installed.path).await?;
                let receipt = install::install_skill(u.skill, &u.installed.path).await?;
                println!("Updated {}", receipt.id);
            }
            Ok(())
        },
        Commands::List => {
            let locations = agents::install_locations(&std::env::current_dir()?, &home_dir()?);
            let installed = install::list_installed(&locations);
            if installed.is_empty() {
                println!("No skills installed.");
                return Ok(());
            }
            for skill in installed {
                println!(
                    "{:<30} {:<20} {}",
                    skill.name,
                    skill.location,
                    truncate(&skill.description, 60)
                );
            }
            Ok(())
        },
        Commands::Config { init } => {
            let path = skillery_config::find_or_default_config_path();
            if *init {
                skillery_config::save_config(&config, &path)?;
                println!("Wrote {}", path.display());
            } else {
                println!("# {}", path.display());
                print!("{}", skillery_config::render_config(&config)?);
            }
            Ok(())
        },
        Commands::Validate { dir } => {
            let report = validate::validate_skill_directory(dir);
            for e in &report.errors {
                println!("error: {e}");
            }
            for w in &report.warnings {
                println!("warning: {w}");
            }
            for i in &report.info {
                println!("info: {i}");
            }
            if !report.is_valid() {
                bail!("validation failed with {} error(s)", report.errors.len());
            }
            println!("{} is valid", dir.display());
            Ok(())
        },
        Commands::Export { format, output } => {
            let Some(format) = export::ExportFormat::parse(format) else {
                bail!("unknown export format '{format}' (expected claude or copilot)");
            };
            let locations = agents::install_locations(&std::env::current_dir()?, &home_dir()?);
            let installed = install::list_installed(&locations);
            if installed.is_empty() {
                bail!("no installed skills to export");
            }
            export::export_to_file(&installed, format, output)?;
            println!("Exported {} skill(s) to {}", installed.len(), output.display());
            Ok(())
        },
    }
}

async fn run_aggregate(
    config: &skillery_config::SkilleryConfig,
    incremental: bool,
    output_dir: &Path,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), incremental, "aggregation starting");

    let aggregator = Aggregator::new(ProviderRegistry::builtin(), &config.aggregator);
    let store = StateStore::new(skillery_config::data_dir().join("state.json"));

    let catalog = if incremental {
        let previous = registry::CatalogClient::load_file(&output_dir.join("catalog.json")).ok();
        match aggregator.run_incremental(&store, previous).await? {
            Some(catalog) => catalog,
            None => {
                println!("Catalog is up to date.");
                return Ok(());
            },
        }
    } else {
        aggregator.run_full(&store).await?
    };

    build::write_outputs(&catalog, output_dir)?;
    println!(
        "Wrote catalog {} with {} skills to {}",
        catalog.version,
        catalog.total_skills,
        output_dir.display()
    );
    Ok(())
}

fn catalog_client(cli: &Cli) -> registry::CatalogClient {
    let url = cli.catalog_url.as_deref().unwrap_or(DEFAULT_CATALOG_URL);
    registry::CatalogClient::new(url, registry::CatalogClient::default_cache_path())
}

fn skill_path(
    config: &skillery_config::SkilleryConfig,
    agent_flag: Option<&str>,
    name: &str,
    project: bool,
) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let home = home_dir()?;
    let requested = agent_flag.unwrap_or(&config.install.default_agent);
    let agent = if requested == "auto" {
        agents::detect_agent(&cwd, &home)
    } else {
        agents::profile(requested)
    };
    Ok(agents::install_path(agent, name, project, &cwd, &home))
}

fn home_dir() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .context("could not determine the home directory")
}

fn print_info(skill: &skillery_catalog::types::CatalogSkill) {
    let r = &skill.record;
    println!("{}", r.id);
    println!("  name:        {}", r.name);
    println!("  description: {}", r.description);
    println!("  provider:    {}", r.provider);
    println!("  category:    {}", r.category);
    if !r.tags.is_empty() {
        println!("  tags:        {}", r.tags.join(", "));
    }
    if let Some(license) = &r.license {
        println!("  license:     {license}");
    }
    if let Some(status) = &r.maintenance_status {
        let days = r
            .days_since_update
            .map_or_else(String::new, |d| format!(" (updated {d} days ago)"));
        println!("  maintenance: {status:?}{days}");
    }
    println!("  quality:     {}/100", r.quality_score);
    if let Some(dup_of) = &skill.duplicate_of {
        println!("  duplicate of {dup_of}");
    }
    if !skill.similar_skills.is_empty() {
        println!("  similar:");
        for s in &skill.similar_skills {
            println!("    {} ({:.0}%)", s.id, s.similarity * 100.0);
        }
    }
    println!("  source:      {}", r.source.repo);
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

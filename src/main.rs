//! smart-asset-sync: import Smart Asset Cloud scene types into a local scene
//!
//! ## Usage
//!
//! ```bash
//! # List scene types available to the configured client
//! smart-asset-sync list
//!
//! # Import a scene type by id or name
//! smart-asset-sync import "Training Room"
//!
//! # Push current images and master data to imported instances
//! smart-asset-sync refresh
//!
//! # Show what has been imported locally
//! smart-asset-sync references
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use smart_asset_sync::host::{FsPackageImporter, JsonSceneHost};
use smart_asset_sync::package_cache::PREFABS_DIR;
use smart_asset_sync::{Config, ImportOrchestrator, LocalReferenceStore, UsageOutcome};

#[derive(Parser)]
#[command(name = "smart-asset-sync")]
#[command(about = "Import Smart Asset Cloud scene types into a local scene")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "smart-asset-sync.toml")]
    config: PathBuf,

    /// Cache directory (overrides config file)
    #[arg(long, env = "SMART_ASSET_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// API base URL (overrides config file)
    #[arg(long, env = "SMART_ASSET_API_URL")]
    api_url: Option<String>,

    /// Token endpoint URL (overrides config file)
    #[arg(long, env = "SMART_ASSET_TOKEN_URL")]
    token_url: Option<String>,

    #[arg(long, env = "SMART_ASSET_CLIENT_ID")]
    client_id: Option<String>,

    #[arg(long, env = "SMART_ASSET_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List scene types in the catalog
    List,
    /// Import every missing usage of a scene type
    Import {
        /// Scene type id or name
        scene_type: String,
    },
    /// Refresh images and master data of imported instances
    Refresh,
    /// Print the locally registered references
    References,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("smart_asset_sync=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
        Config::default()
    };

    if let Some(base_dir) = cli.base_dir {
        config.cache.base_dir = base_dir;
    }
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }
    if let Some(token_url) = cli.token_url {
        config.credentials.token_url = token_url;
    }
    if let Some(client_id) = cli.client_id {
        config.credentials.client_id = client_id;
    }
    if let Some(client_secret) = cli.client_secret {
        config.credentials.client_secret = client_secret;
    }

    let references_path = config.references_path();
    let references = LocalReferenceStore::load(&references_path)?;

    match cli.command {
        Command::References => print_references(&references),
        Command::List => {
            let session = Session::connect(&config, references)?;
            for scene_type in session.orchestrator.list_scene_types().await? {
                println!("{}\t{}", scene_type.id, scene_type.name);
            }
        }
        Command::Import { scene_type } => {
            let session = Session::connect(&config, references)?;
            let orchestrator = &session.orchestrator;
            let available = orchestrator.list_scene_types().await?;
            let selected = available
                .iter()
                .find(|s| s.id == scene_type || s.name == scene_type)
                .ok_or_else(|| anyhow::anyhow!("Unknown scene type: {}", scene_type))?;

            let mut progress = orchestrator.subscribe_progress();
            tokio::spawn(async move {
                while let Ok(event) = progress.recv().await {
                    debug!(
                        usage = event.usage_index,
                        of = event.usage_count,
                        state = ?event.state,
                        "Import progress"
                    );
                }
            });

            let report = orchestrator.import_scene_type(selected).await?;
            for usage in &report.usages {
                match &usage.outcome {
                    UsageOutcome::Imported { prefab, .. } => {
                        println!("imported  {}\t{} ({})", usage.usage_id, usage.instance_name, prefab)
                    }
                    UsageOutcome::Skipped => {
                        println!("skipped   {}\t{}", usage.usage_id, usage.instance_name)
                    }
                    UsageOutcome::Failed(e) => {
                        println!("failed    {}\t{}: {}", usage.usage_id, usage.instance_name, e)
                    }
                }
            }
            session.persist(&references_path).await?;
        }
        Command::Refresh => {
            let session = Session::connect(&config, references)?;
            let report = session.orchestrator.refresh_instances().await?;
            println!(
                "images applied: {}, master data updated: {}",
                report.images_applied, report.master_data_updated
            );
            for (id, e) in &report.failures {
                warn!(id = %id, error = %e, "Refresh failure");
            }
            session.persist(&references_path).await?;
        }
    }

    Ok(())
}

/// Orchestrator wired to the headless host
struct Session {
    orchestrator: ImportOrchestrator,
    scene: Arc<JsonSceneHost>,
    scene_path: PathBuf,
}

impl Session {
    fn connect(config: &Config, references: LocalReferenceStore) -> anyhow::Result<Self> {
        config.validate()?;
        debug!(credentials = ?config.credentials, "Using credentials");

        let prefab_dir = config.cache.base_dir.join(PREFABS_DIR);
        let scene_path = config.scene_path();
        let scene = Arc::new(JsonSceneHost::load(&scene_path, prefab_dir.clone())?);
        let importer = Arc::new(FsPackageImporter::new(prefab_dir));
        let orchestrator =
            ImportOrchestrator::from_config(config, importer, scene.clone(), references)?;

        Ok(Self {
            orchestrator,
            scene,
            scene_path,
        })
    }

    async fn persist(&self, references_path: &Path) -> anyhow::Result<()> {
        self.orchestrator.references().await.save(references_path)?;
        self.scene.save(&self.scene_path)?;
        info!(
            references = %references_path.display(),
            scene = %self.scene_path.display(),
            "Saved state"
        );
        Ok(())
    }
}

fn print_references(store: &LocalReferenceStore) {
    if store.is_empty() {
        println!("No scene types imported yet");
        return;
    }
    for reference in store.references() {
        println!("{}\t{}", reference.id, reference.name);
        for instance in &reference.instances {
            println!("  {}\t{}\t{}", instance.id, instance.name, instance.version);
        }
    }
}

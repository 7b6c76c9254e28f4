//! # BRMSCTL CLI
//!
//! Command-line host for the BRMS reconciliation engine.
//!
//! Each invocation runs one lifecycle call for one resource instance. The desired
//! configuration is read from a YAML or JSON file; the tracked record lives in a JSON
//! state file between invocations.
//!
//! ## Usage
//!
//! ```bash
//! # Create a project and start tracking it
//! brmsctl project create -f project.yaml --state project.json
//!
//! # Refresh tracked state from the backend
//! brmsctl project read --state project.json
//!
//! # Converge an environment to its desired configuration
//! brmsctl environment update -f staging.yaml --state staging.json
//!
//! # Delete a group and drop its state file
//! brmsctl group delete --state admins.json
//!
//! # Describe the accepted fields of a resource kind
//! brmsctl schema environment
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use brms_reconciler::model::ResourceKind;
use brms_reconciler::observability::{self, metrics};
use brms_reconciler::{
    schema, Engine, EngineConfig, ReferenceMode, Reconciler, StateFile, TrackedResource, Warning,
};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// BRMS reconciliation CLI
#[derive(Parser)]
#[command(name = "brmsctl", version = VERSION)]
#[command(
    about = "Converge BRMS projects, environments and groups to a declared configuration",
    long_about = None,
    after_help = "\
Connection settings come from BRMS_BASE_URL and BRMS_TOKEN unless given as flags.

Examples:
  brmsctl project create -f project.yaml --state project.json
  brmsctl environment read --state staging.json
  brmsctl schema group
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides BRMS_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Personal access token (overrides BRMS_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Fail when an approval group name does not exist in the project
    #[arg(long, global = true)]
    strict_references: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage a project
    Project {
        #[command(subcommand)]
        action: Action,
    },
    /// Manage an environment within a project
    Environment {
        #[command(subcommand)]
        action: Action,
    },
    /// Manage a group within a project
    Group {
        #[command(subcommand)]
        action: Action,
    },
    /// Print the JSON Schema of a resource kind's desired configuration
    Schema {
        #[arg(value_enum, value_name = "KIND")]
        kind: KindArg,
    },
}

#[derive(Subcommand)]
enum Action {
    /// Create the resource and start tracking it
    Create {
        /// Desired configuration (YAML or JSON)
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Refresh the tracked record from the backend
    Read {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Replace the resource with its desired configuration
    Update {
        /// Desired configuration (YAML or JSON)
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
    /// Delete the resource and drop the state file
    Delete {
        #[arg(long, value_name = "FILE")]
        state: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Project,
    Environment,
    Group,
}

impl From<KindArg> for ResourceKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Project => ResourceKind::Project,
            KindArg::Environment => ResourceKind::Environment,
            KindArg::Group => ResourceKind::Group,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider before any TLS client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        bail!("Failed to install rustls crypto provider");
    }

    observability::init_tracing();
    metrics::register_metrics()?;

    let cli = Cli::parse();

    let (kind, action) = match cli.command {
        Commands::Schema { kind } => {
            let schema = schema::schema_for(kind.into());
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }
        Commands::Project { action } => (KindArg::Project, action),
        Commands::Environment { action } => (KindArg::Environment, action),
        Commands::Group { action } => (KindArg::Group, action),
    };

    let mut config = EngineConfig::from_env_with(cli.base_url.as_deref(), cli.token.as_deref())
        .context("Invalid BRMS configuration")?;
    if cli.strict_references {
        config.reference_mode = ReferenceMode::Strict;
    }
    let engine = Engine::connect(&config).context("Failed to create BRMS client")?;

    let result = match kind {
        KindArg::Project => run(&engine.projects(), action).await,
        KindArg::Environment => run(&engine.environments(), action).await,
        KindArg::Group => run(&engine.groups(), action).await,
    };

    if cli.print_metrics {
        eprintln!("{}", metrics::gather_text()?);
    }
    result
}

/// Run one lifecycle call against the tracked state file
async fn run<R>(reconciler: &R, action: Action) -> Result<()>
where
    R: Reconciler,
    R::Spec: DeserializeOwned,
    R::State: Serialize + DeserializeOwned + Clone,
{
    match action {
        Action::Create { file, state } => {
            let store = StateFile::new(state);
            let mut tracked = store.load::<R::State>(R::KIND)?;
            if tracked.managed().is_some() {
                bail!(
                    "{} in {} is already managed; use update instead",
                    R::KIND,
                    store.path().display()
                );
            }
            let desired: R::Spec = read_desired(&file)?;
            let applied = reconciler
                .create(&desired)
                .await
                .with_context(|| format!("Failed to create {}", R::KIND))?;
            let warnings = tracked.apply(applied);
            finish(&store, &tracked, &warnings)
        }
        Action::Read { state } => {
            let store = StateFile::new(state);
            let mut tracked = store.load::<R::State>(R::KIND)?;
            let Some(current) = tracked.managed().cloned() else {
                bail!("No managed {} in {}", R::KIND, store.path().display());
            };
            let outcome = reconciler
                .read(&current)
                .await
                .with_context(|| format!("Failed to read {}", R::KIND))?;
            let warnings = tracked.apply_read(outcome);
            finish(&store, &tracked, &warnings)
        }
        Action::Update { file, state } => {
            let store = StateFile::new(state);
            let mut tracked = store.load::<R::State>(R::KIND)?;
            let Some(current) = tracked.managed().cloned() else {
                bail!("No managed {} in {}; use create first", R::KIND, store.path().display());
            };
            let desired: R::Spec = read_desired(&file)?;
            let applied = reconciler
                .update(&current, &desired)
                .await
                .with_context(|| format!("Failed to update {}", R::KIND))?;
            let warnings = tracked.apply(applied);
            finish(&store, &tracked, &warnings)
        }
        Action::Delete { state } => {
            let store = StateFile::new(state);
            let mut tracked = store.load::<R::State>(R::KIND)?;
            let Some(current) = tracked.managed().cloned() else {
                info!(state = %store.path().display(), "nothing to delete");
                return Ok(());
            };
            reconciler
                .delete(&current)
                .await
                .with_context(|| format!("Failed to delete {}", R::KIND))?;
            tracked.mark_absent();
            finish(&store, &tracked, &[])
        }
    }
}

/// Report warnings, persist the tracked record and print it
fn finish<S: Serialize>(
    store: &StateFile,
    tracked: &TrackedResource<S>,
    warnings: &[Warning],
) -> Result<()> {
    for warning in warnings {
        warn!(summary = %warning.summary, detail = %warning.detail, "reconciliation warning");
    }
    store.save(tracked)?;
    println!("{}", serde_json::to_string_pretty(tracked)?);
    info!(phase = ?tracked.phase, state = %store.path().display(), "state updated");
    Ok(())
}

fn read_desired<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse desired configuration {}", path.display()))
}

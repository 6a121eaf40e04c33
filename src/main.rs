//! DataVolume Provider CLI
//!
//! Drives the DataVolume lifecycle against the current cluster, keeping the
//! managed resource's identity and last known configuration in a JSON state
//! file.
//!
//! ```text
//! datavolume-provider create -f fedora.yaml
//! datavolume-provider update -f fedora.yaml
//! datavolume-provider read
//! datavolume-provider delete
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use datavolume_provider::adapters::{KubernetesDataVolumeStore, LoggingEventPublisher};
use datavolume_provider::resource::load_config;
use datavolume_provider::schema::resource_schema;
use datavolume_provider::{
    parse_duration, DataVolumeResource, Error, PollSchedule, ProviderConfig, ResourceState,
    ResourceTimeouts, Result,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// DataVolume Provider - declarative management of CDI DataVolumes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// State file holding the resource id and last known configuration
    #[arg(
        long,
        env = "DATAVOLUME_STATE",
        default_value = "datavolume.state.json",
        global = true
    )]
    state: PathBuf,

    /// Deadline for a create to converge (e.g. 5m, 1h30m)
    #[arg(long, env = "CREATE_TIMEOUT", default_value = "5m", value_parser = duration_arg, global = true)]
    create_timeout: Duration,

    /// Deadline for a delete to converge
    #[arg(long, env = "DELETE_TIMEOUT", default_value = "5m", value_parser = duration_arg, global = true)]
    delete_timeout: Duration,

    /// Fixed interval between polls; exponential backoff when unset
    #[arg(long, env = "POLL_INTERVAL", value_parser = duration_arg, global = true)]
    poll_interval: Option<Duration>,

    /// Consecutive read errors tolerated while waiting
    #[arg(long, env = "MAX_CONSECUTIVE_ERRORS", default_value = "0", global = true)]
    max_consecutive_errors: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the DataVolume described by a configuration file
    Create {
        #[arg(short = 'f', long)]
        file: PathBuf,
    },
    /// Refresh the state from the cluster
    Read,
    /// Apply label and annotation changes from a configuration file
    Update {
        #[arg(short = 'f', long)]
        file: PathBuf,
    },
    /// Delete the DataVolume and wait until it is gone
    Delete,
    /// Print whether the DataVolume exists
    Exists,
    /// Adopt an existing DataVolume by its namespace/name id
    Import { id: String },
    /// Print the configuration JSON schema
    Schema,
}

fn duration_arg(s: &str) -> std::result::Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

impl Args {
    fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            timeouts: ResourceTimeouts {
                create: self.create_timeout,
                delete: self.delete_timeout,
            },
            poll: self
                .poll_interval
                .map(PollSchedule::Fixed)
                .unwrap_or_default(),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    if let Command::Schema = args.command {
        println!("{}", serde_json::to_string_pretty(&resource_schema())?);
        return Ok(());
    }

    let store = KubernetesDataVolumeStore::try_default().await.map_err(|e| {
        error!("Failed to create Kubernetes client: {}", e);
        Error::Internal(format!("Kubernetes client creation failed: {}", e))
    })?;
    info!("Connected to Kubernetes cluster");

    let cancellation = CancellationToken::new();
    let on_signal = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, abandoning wait");
            on_signal.cancel();
        }
    });

    let resource = DataVolumeResource::new(
        Arc::new(store),
        Arc::new(LoggingEventPublisher),
        args.provider_config(),
    )
    .with_cancellation(cancellation);

    run(&args, &resource).await
}

async fn run(args: &Args, resource: &DataVolumeResource) -> Result<()> {
    match &args.command {
        Command::Create { file } => {
            let mut state = ResourceState::new(load_config(file)?);
            let result = resource.create(&mut state).await;
            // A failed wait still leaves a remote object behind
            if state.id.is_some() {
                state.save(&args.state)?;
            }
            result
        }
        Command::Read => {
            let mut state = ResourceState::load(&args.state)?;
            resource.read(&mut state).await?;
            state.save(&args.state)
        }
        Command::Update { file } => {
            let desired = load_config(file)?;
            let mut state = ResourceState::load(&args.state)?;
            resource.update(&mut state, &desired).await?;
            state.save(&args.state)
        }
        Command::Delete => {
            let mut state = ResourceState::load(&args.state)?;
            resource.delete(&mut state).await?;
            state.save(&args.state)
        }
        Command::Exists => {
            let state = ResourceState::load(&args.state)?;
            let (exists, err) = resource
                .exists(state.id.as_deref().unwrap_or_default())
                .await;
            println!("{}", exists);
            err.map_or(Ok(()), Err)
        }
        Command::Import { id } => {
            let state = resource.import(id).await?;
            state.save(&args.state)
        }
        Command::Schema => Ok(()),
    }
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries command output
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

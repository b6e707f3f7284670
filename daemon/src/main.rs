//! bftb: run a bank replica, or talk to a deployment as a client.

mod client;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use bftb_client::{decrypt_keystore, load_keystore, HttpReplica};
use bftb_crypto::generate_keypair;
use bftb_protocol::{collect_replica_keys, KeyExchangeError, ReplicaApi, PROTOCOL_VERSION};
use bftb_replica::{Replica, ReplicaConfig, ShutdownController};
use bftb_rpc::RpcServer;
use bftb_types::KeyPair;
use bftb_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "bftb", about = "Byzantine fault tolerant bank", version)]
struct Cli {
    /// Log output format: "human" or "json".
    #[arg(long, global = true, env = "BFTB_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "BFTB_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run one replica.
    Replica {
        #[command(subcommand)]
        action: ReplicaAction,
    },
    /// Act as a client of a deployment.
    Client(client::ClientArgs),
}

#[derive(clap::Subcommand)]
enum ReplicaAction {
    /// Serve the replica until SIGINT/SIGTERM.
    Run(RunArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "BFTB_CONFIG")]
    config: Option<PathBuf>,

    /// This replica's index.
    #[arg(long, env = "BFTB_REPLICA_ID")]
    id: Option<usize>,

    /// Total number of replicas (N).
    #[arg(long, env = "BFTB_REPLICAS")]
    replicas: Option<usize>,

    /// Tolerated Byzantine replicas (f).
    #[arg(long, env = "BFTB_FAULTS")]
    faults: Option<usize>,

    #[arg(long, env = "BFTB_HOST")]
    host: Option<String>,

    /// Replica `i` listens on `base_port + i`.
    #[arg(long, env = "BFTB_BASE_PORT")]
    base_port: Option<u16>,

    /// Directory for ledger snapshots.
    #[arg(long, env = "BFTB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, env = "BFTB_WORK_BITS")]
    work_bits: Option<u32>,

    /// Encrypted keystore holding the replica's signing key. Without one a
    /// fresh key is generated for this run.
    #[arg(long, env = "BFTB_REPLICA_KEY")]
    key: Option<PathBuf>,

    /// Password of the replica keystore.
    #[arg(long, env = "BFTB_REPLICA_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl RunArgs {
    /// File config (or defaults) with flags and env vars applied on top.
    fn resolve(&self) -> anyhow::Result<ReplicaConfig> {
        let mut config = match &self.config {
            Some(path) => ReplicaConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ReplicaConfig::default(),
        };
        if let Some(id) = self.id {
            config.id = id;
        }
        if let Some(replicas) = self.replicas {
            config.replicas = replicas;
        }
        if let Some(faults) = self.faults {
            config.faults = faults;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.base_port {
            config.base_port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        if let Some(bits) = self.work_bits {
            config.work_difficulty_bits = bits;
        }
        config.validate()?;
        Ok(config)
    }

    fn identity(&self) -> anyhow::Result<KeyPair> {
        match &self.key {
            Some(path) => {
                let password = self
                    .password
                    .as_deref()
                    .context("--password (or BFTB_REPLICA_PASSWORD) is required with --key")?;
                Ok(decrypt_keystore(&load_keystore(path)?, password)?)
            }
            None => {
                tracing::warn!("no replica keystore given, using a key for this run only");
                Ok(generate_keypair())
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Replica {
            action: ReplicaAction::Run(args),
        } => {
            let config = args.resolve()?;
            let format = match cli.log_format {
                Some(format) => format,
                None => config.log_format.parse()?,
            };
            init_logging(format, cli.log_level.as_deref().unwrap_or(&config.log_level));
            run_replica(config, args.identity()?).await
        }
        Command::Client(args) => {
            init_logging(
                cli.log_format.unwrap_or_default(),
                cli.log_level.as_deref().unwrap_or("warn"),
            );
            client::run(args).await
        }
    }
}

async fn run_replica(config: ReplicaConfig, identity: KeyPair) -> anyhow::Result<()> {
    let params = config.quorum_params()?;
    tracing::info!(
        replica = config.id,
        replicas = params.replicas(),
        faults = params.faults(),
        threshold = params.threshold(),
        key = %identity.public,
        protocol_version = PROTOCOL_VERSION,
        "starting replica"
    );

    let replica = Arc::new(Replica::open(identity, &config)?);
    let addr = format!("{}:{}", config.host, config.listen_port());
    let server = RpcServer::bind(&addr, Arc::clone(&replica)).await?;

    let shutdown = ShutdownController::new();
    let server_task = tokio::spawn(server.serve(shutdown.signalled()));

    // Readiness barrier: report once every replica has answered with its key.
    let peers = (0..config.replicas)
        .map(|peer| {
            HttpReplica::new(config.replica_url(peer), Duration::from_secs(2))
                .map(|api| Arc::new(api) as Arc<dyn ReplicaApi>)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let deadline = config.key_exchange_timeout();
    tokio::spawn(async move {
        match collect_replica_keys(&peers, deadline, Duration::from_millis(500)).await {
            Ok(directory) => tracing::info!(replicas = directory.len(), "deployment ready"),
            Err(KeyExchangeError::Incomplete { missing, waited, .. }) => tracing::warn!(
                ?missing,
                ?waited,
                "some replicas did not announce a key; serving anyway"
            ),
        }
    });

    let reason = shutdown.wait_for_signal().await;
    server_task.await??;
    tracing::info!(replica = config.id, %reason, "replica exited cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.toml");
        std::fs::write(&path, "replicas = 7\nfaults = 2\nid = 1\n").unwrap();

        let cli = Cli::try_parse_from([
            "bftb",
            "replica",
            "run",
            "--config",
            path.to_str().unwrap(),
            "--id",
            "5",
            "--base-port",
            "9000",
        ])
        .unwrap();
        let Command::Replica {
            action: ReplicaAction::Run(args),
        } = cli.command
        else {
            panic!("expected replica run");
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.replicas, 7);
        assert_eq!(config.faults, 2);
        assert_eq!(config.id, 5);
        assert_eq!(config.listen_port(), 9005);
    }

    #[test]
    fn invalid_deployment_is_refused() {
        let cli = Cli::try_parse_from([
            "bftb", "replica", "run", "--replicas", "2", "--faults", "1",
        ])
        .unwrap();
        let Command::Replica {
            action: ReplicaAction::Run(args),
        } = cli.command
        else {
            panic!("expected replica run");
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn log_format_flag_parses() {
        let cli = Cli::try_parse_from([
            "bftb",
            "--log-format",
            "json",
            "client",
            "keygen",
            "--out",
            "k.json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }
}

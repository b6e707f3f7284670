//! `bftb client ...`: one quorum operation per invocation.

use std::path::{Path, PathBuf};

use anyhow::Context;

use bftb_client::{
    decrypt_keystore, encrypt_keystore, load_keystore, save_keystore, ClientConfig, ClientSession,
};
use bftb_crypto::generate_keypair;
use bftb_types::{AccountId, Balance, KeyPair, PublicKey, Transaction, TransactionId};

#[derive(clap::Args)]
pub struct ClientArgs {
    /// Client TOML configuration listing the replica URLs.
    #[arg(long, env = "BFTB_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Replica base URLs, comma-separated. Overrides the config file.
    #[arg(long, env = "BFTB_REPLICA_URLS", value_delimiter = ',')]
    replicas: Vec<String>,

    /// Tolerated Byzantine replicas (f).
    #[arg(long, env = "BFTB_FAULTS")]
    faults: Option<usize>,

    /// Keystore password.
    #[arg(long, env = "BFTB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    action: ClientAction,
}

#[derive(clap::Subcommand)]
enum ClientAction {
    /// Generate a key pair and store it encrypted.
    Keygen {
        #[arg(long)]
        out: PathBuf,
    },
    /// Open the account of the key in `--key`.
    Open {
        #[arg(long)]
        key: PathBuf,
    },
    /// Transfer `amount` to the account with public key `to` (hex).
    Send {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        to: PublicKey,
        #[arg(long)]
        amount: Balance,
    },
    /// Show balance and pending credits.
    Check {
        #[arg(long)]
        key: PathBuf,
    },
    /// Accept pending credit `tx`.
    Receive {
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        tx: u64,
    },
    /// Show the settled transaction history.
    Audit {
        #[arg(long)]
        key: PathBuf,
    },
    /// Look up the public key of account `id`.
    KeyOf {
        #[arg(long)]
        id: u64,
    },
}

impl ClientArgs {
    fn config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if !self.replicas.is_empty() {
            config.replica_urls = self.replicas.clone();
        }
        if let Some(faults) = self.faults {
            config.faults = faults;
        }
        if config.replica_urls.is_empty() {
            anyhow::bail!("no replicas configured: pass --replicas or --config");
        }
        Ok(config)
    }

    fn password(&self) -> anyhow::Result<&str> {
        self.password
            .as_deref()
            .context("--password (or BFTB_PASSWORD) is required")
    }

    fn unlock(&self, path: &Path) -> anyhow::Result<KeyPair> {
        Ok(decrypt_keystore(&load_keystore(path)?, self.password()?)?)
    }
}

pub async fn run(args: ClientArgs) -> anyhow::Result<()> {
    if let ClientAction::Keygen { out } = &args.action {
        let keypair = generate_keypair();
        save_keystore(&encrypt_keystore(&keypair, args.password()?)?, out)?;
        println!("{}", keypair.public.to_hex());
        return Ok(());
    }

    let session = ClientSession::connect(&args.config()?)?;
    match &args.action {
        ClientAction::Keygen { .. } => {}
        ClientAction::Open { key } => {
            let id = session.open_account(&args.unlock(key)?).await?;
            println!("account {id}");
        }
        ClientAction::Send { key, to, amount } => {
            let tx = session.send_amount(&args.unlock(key)?, to, *amount).await?;
            println!("transaction {tx}");
        }
        ClientAction::Check { key } => {
            let statement = session.check_account(&args.unlock(key)?).await?;
            println!("balance {}", statement.balance);
            print_transactions(&statement.pending_credits)?;
        }
        ClientAction::Receive { key, tx } => {
            let amount = session
                .receive_amount(&args.unlock(key)?, TransactionId(*tx))
                .await?;
            println!("received {amount}");
        }
        ClientAction::Audit { key } => {
            let history = session.audit(&args.unlock(key)?).await?;
            print_transactions(&history)?;
        }
        ClientAction::KeyOf { id } => {
            let key = session.public_key_by_id(AccountId(*id)).await?;
            println!("{}", key.to_hex());
        }
    }
    Ok(())
}

fn print_transactions(transactions: &[Transaction]) -> anyhow::Result<()> {
    for tx in transactions {
        println!("{}", serde_json::to_string(tx)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ClientArgs,
    }

    fn parse(argv: &[&str]) -> ClientArgs {
        Harness::try_parse_from(std::iter::once("client").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn replica_urls_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(
            &path,
            "replica_urls = [\"http://a:1\", \"http://b:2\", \"http://c:3\"]\nfaults = 1\n",
        )
        .unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--replicas",
            "http://x:1,http://y:2,http://z:3,http://w:4",
            "check",
            "--key",
            "k.json",
        ]);
        let config = args.config().unwrap();
        assert_eq!(config.replica_urls.len(), 4);
        assert_eq!(config.replica_urls[3], "http://w:4");
    }

    #[test]
    fn missing_replicas_is_an_error() {
        let args = parse(&["key-of", "--id", "3"]);
        assert!(args.config().is_err());
    }

    #[test]
    fn send_parses_destination_key() {
        let to = "11".repeat(32);
        let args = parse(&["send", "--key", "k.json", "--to", &to, "--amount", "5"]);
        let ClientAction::Send { to, amount, .. } = args.action else {
            panic!("expected send");
        };
        assert_eq!(to, PublicKey([0x11; 32]));
        assert_eq!(amount, 5);
    }

    #[tokio::test]
    async fn keygen_writes_a_keystore_that_unlocks() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("alice.json");
        let args = parse(&[
            "--password",
            "hunter2",
            "keygen",
            "--out",
            out.to_str().unwrap(),
        ]);
        run(args).await.unwrap();

        let args = parse(&["--password", "hunter2", "audit", "--key", "unused"]);
        assert!(args.unlock(&out).is_ok());
    }
}

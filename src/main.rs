//! Ledgermesh operator CLI
//!
//! Drives a local embedded mesh through the same client path a networked
//! deployment would use: every command resolves handles through the
//! connection cache and dispatches by operation name.
//!
//! # Usage
//!
//! ```text
//! ledgermesh seed                          # write the bootstrap topology
//! ledgermesh shards                        # list registry records
//! ledgermesh create-shard 3 CIFAR3         # register a shard
//! ledgermesh models CIFAR1                 # list one shard's models
//! ledgermesh create-model m1 --ordinal 2   # route a model and store it
//! ledgermesh route --key m1                # show an assignment
//! ledgermesh enroll                        # provision identities (dev authority)
//! ledgermesh evaluate mainline catalyst GetAllShards
//! ```
//!
//! Shard channels registered in one run are deployed on the next open, so
//! `seed` first, then work against the shard channels.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgermesh::client::{
    enroll_admin, register_user, CertificateAuthority, Enrollment, Identity, IdentityVault,
    LedgerClient, ShardRouter,
};
use ledgermesh::config::{Settings, CONTROL_CHANNEL, MODEL_CONTRACT, REGISTRY_CONTRACT};
use ledgermesh::encoding::content_fingerprint;
use ledgermesh::gateway::EmbeddedGateway;
use ledgermesh::Result;

#[derive(Parser, Debug)]
#[command(name = "ledgermesh")]
#[command(about = "Operator CLI for a ledgermesh deployment", version)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the bootstrap shard topology into the registry
    Seed,
    /// List every registry record, degraded entries included
    Shards,
    /// Register a new shard
    CreateShard {
        id: String,
        channel: String,
        #[arg(long, default_value_t = 0)]
        min_peers: u32,
        #[arg(long, default_value = "")]
        pinned_hash: String,
    },
    /// Remove a shard from the registry
    DeleteShard { id: String },
    /// List the models stored on one shard channel
    Models { channel: String },
    /// Route a model onto a shard and create it there
    CreateModel {
        id: String,
        #[arg(long, default_value = "me")]
        owner: String,
        #[arg(long, default_value = "")]
        server: String,
        #[arg(long, default_value_t = 1)]
        round: u32,
        #[arg(long, default_value_t = 0.0)]
        accuracy: f64,
        /// File to fingerprint as the model hash
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Assignment ordinal; defaults to routing by the model id
        #[arg(long)]
        ordinal: Option<u64>,
    },
    /// Show which shard an ordinal or key routes to
    Route {
        #[arg(long)]
        ordinal: Option<u64>,
        #[arg(long)]
        key: Option<String>,
    },
    /// Provision the registrar and application identities into the vault
    Enroll,
    /// List the principals held in the identity vault
    Identities,
    /// Submit a state-changing operation against any contract
    Submit {
        channel: String,
        contract: String,
        operation: String,
        args: Vec<String>,
    },
    /// Evaluate a read-only operation against any contract
    Evaluate {
        channel: String,
        contract: String,
        operation: String,
        args: Vec<String>,
    },
}

/// Development authority: mints placeholder credentials so the provisioning
/// flow can be exercised without a live authority.
struct DevAuthority;

#[async_trait::async_trait]
impl CertificateAuthority for DevAuthority {
    async fn enroll(&self, id: &str, _secret: &str) -> Result<Enrollment> {
        Ok(Enrollment {
            certificate: format!("-----BEGIN DEV CERTIFICATE-----\n{id}\n-----END DEV CERTIFICATE-----"),
            private_key: format!("-----BEGIN DEV KEY-----\n{id}\n-----END DEV KEY-----"),
        })
    }

    async fn register(
        &self,
        id: &str,
        _affiliation: &str,
        _role: &str,
        _registrar: &Identity,
    ) -> Result<String> {
        Ok(format!("dev-secret-{id}"))
    }
}

fn open_client(settings: &Settings) -> Result<LedgerClient> {
    let db = sled::open(settings.state_db_path())?;
    let gateway = EmbeddedGateway::open_mesh(&db)?;
    Ok(LedgerClient::new(Arc::new(gateway)))
}

fn print_payload(bytes: &[u8]) {
    if bytes.is_empty() {
        println!("ok");
        return;
    }
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default())
        }
        Err(_) => println!("{}", String::from_utf8_lossy(bytes)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut settings = cli.settings;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ledgermesh={},warn", settings.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    settings.apply_profile()?;
    if let Err(e) = settings.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Command::Seed => {
            let mut client = open_client(&settings)?;
            client
                .channel(CONTROL_CHANNEL)
                .contract(REGISTRY_CONTRACT)
                .submit("InitLedger", &[])
                .await?;
            client.disconnect().await;
            println!("registry seeded; shard channels deploy on next run");
        }
        Command::Shards => {
            let mut client = open_client(&settings)?;
            let out = client
                .channel(CONTROL_CHANNEL)
                .contract(REGISTRY_CONTRACT)
                .evaluate("GetAllShards", &[])
                .await?;
            client.disconnect().await;
            print_payload(&out);
        }
        Command::CreateShard {
            id,
            channel,
            min_peers,
            pinned_hash,
        } => {
            let mut client = open_client(&settings)?;
            client
                .channel(CONTROL_CHANNEL)
                .contract(REGISTRY_CONTRACT)
                .submit(
                    "CreateShard",
                    &[id.clone(), channel, min_peers.to_string(), pinned_hash],
                )
                .await?;
            client.disconnect().await;
            println!("shard {id} registered");
        }
        Command::DeleteShard { id } => {
            let mut client = open_client(&settings)?;
            client
                .channel(CONTROL_CHANNEL)
                .contract(REGISTRY_CONTRACT)
                .submit("DeleteShard", &[id.clone()])
                .await?;
            client.disconnect().await;
            println!("shard {id} removed");
        }
        Command::Models { channel } => {
            let mut client = open_client(&settings)?;
            let out = client
                .channel(&channel)
                .contract(MODEL_CONTRACT)
                .evaluate("GetAllModels", &[])
                .await?;
            client.disconnect().await;
            print_payload(&out);
        }
        Command::CreateModel {
            id,
            owner,
            server,
            round,
            accuracy,
            payload,
            ordinal,
        } => {
            let hash = match payload {
                Some(path) => content_fingerprint(&std::fs::read(path)?),
                None => String::new(),
            };

            let mut client = open_client(&settings)?;
            let router = ShardRouter::load(&mut client).await?;
            let shard = match ordinal {
                Some(n) => router.route_ordinal(n)?,
                None => router.route_key(&id)?,
            };
            let (shard_id, shard_channel) = (shard.id.clone(), shard.channel.clone());

            client
                .channel(&shard_channel)
                .contract(MODEL_CONTRACT)
                .submit(
                    "CreateModel",
                    &[
                        id.clone(),
                        hash,
                        owner,
                        server,
                        round.to_string(),
                        accuracy.to_string(),
                    ],
                )
                .await?;
            client.disconnect().await;
            println!("model {id} -> shard {shard_id} (channel {shard_channel})");
        }
        Command::Route { ordinal, key } => {
            let mut client = open_client(&settings)?;
            let router = ShardRouter::load(&mut client).await?;
            client.disconnect().await;

            let shard = match (ordinal, key) {
                (Some(n), None) => router.route_ordinal(n)?,
                (None, Some(k)) => router.route_key(&k)?,
                _ => {
                    error!("pass exactly one of --ordinal or --key");
                    std::process::exit(2);
                }
            };
            println!("shard {} (channel {})", shard.id, shard.channel);
        }
        Command::Enroll => {
            let vault = IdentityVault::open(settings.vault_path())?;
            let ca = DevAuthority;
            enroll_admin(
                &ca,
                &vault,
                &settings.msp_id,
                &settings.admin_id,
                &settings.admin_secret,
            )
            .await?;
            register_user(
                &ca,
                &vault,
                &settings.msp_id,
                &settings.admin_id,
                &settings.user_id,
                &settings.affiliation,
            )
            .await?;
            println!("enrolled {} and {}", settings.admin_id, settings.user_id);
        }
        Command::Identities => {
            let vault = IdentityVault::open(settings.vault_path())?;
            for id in vault.list_ids()? {
                println!("{id}");
            }
        }
        Command::Submit {
            channel,
            contract,
            operation,
            args,
        } => {
            let mut client = open_client(&settings)?;
            let out = client
                .channel(&channel)
                .contract(&contract)
                .submit(&operation, &args)
                .await?;
            client.disconnect().await;
            print_payload(&out);
        }
        Command::Evaluate {
            channel,
            contract,
            operation,
            args,
        } => {
            let mut client = open_client(&settings)?;
            let out = client
                .channel(&channel)
                .contract(&contract)
                .evaluate(&operation, &args)
                .await?;
            client.disconnect().await;
            print_payload(&out);
        }
    }

    Ok(())
}

//! Takos CLI
//!
//! Key generation, validation and envelope sealing from the command line.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use takos_keys::{
    generate_account_key, generate_device_key, generate_identity_key, validate, AnyKey, KeyType,
    TypedKey,
};
use takos_protocol::runtime::{decrypt_with_async, encrypt_for_async, generate_master_key_async};
use takos_protocol::{verify_participant, EncryptedEnvelope, ParticipantKeys, ProtocolConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "takos")]
#[command(version)]
#[command(about = "Takos - post-quantum key hierarchy and hybrid encryption", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "TAKOS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a master -> identity -> account chain
    Keygen {
        /// Output directory for key files
        dir: PathBuf,
    },

    /// Structurally validate a key object
    Validate {
        /// Expected key type, e.g. identityKeyPublic
        #[arg(short = 't', long = "type")]
        key_type: String,

        /// Key object JSON file
        file: PathBuf,
    },

    /// Verify the delegation chain written by `keygen`
    VerifyChain {
        /// Directory holding the chain
        dir: PathBuf,
    },

    /// Encrypt a file to a public or symmetric key
    Seal {
        /// Recipient key JSON file
        #[arg(long)]
        to: PathBuf,

        /// Plaintext input
        input: PathBuf,

        /// Envelope output
        output: PathBuf,
    },

    /// Decrypt an envelope with a private or symmetric key
    Open {
        /// Own key JSON file
        #[arg(long)]
        key: PathBuf,

        /// Envelope input
        input: PathBuf,

        /// Plaintext output
        output: PathBuf,
    },

    /// Generate a local device key
    DeviceKey {
        /// Output file
        output: PathBuf,
    },

    /// Version information
    Version,
}

const MASTER_PUBLIC: &str = "master_public.json";
const MASTER_PRIVATE: &str = "master_private.json";
const IDENTITY_PUBLIC: &str = "identity_public.json";
const IDENTITY_PRIVATE: &str = "identity_private.json";
const IDENTITY_SIGNATURE: &str = "identity_signature.json";
const ACCOUNT_PUBLIC: &str = "account_public.json";
const ACCOUNT_PRIVATE: &str = "account_private.json";
const ACCOUNT_SIGNATURE: &str = "account_signature.json";

fn init_logging(verbose: bool, config: &ProtocolConfig) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            )
            .init();
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write(path: &Path, content: impl AsRef<[u8]>) -> anyhow::Result<()> {
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

/// Write key material readable by the owner only
#[cfg(unix)]
fn write_secret(path: &Path, content: impl AsRef<[u8]>) -> anyhow::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    // mode() only applies to newly created files
    file.set_permissions(fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restricting {}", path.display()))?;
    file.write_all(content.as_ref())
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(not(unix))]
fn write_secret(path: &Path, content: impl AsRef<[u8]>) -> anyhow::Result<()> {
    write(path, content)
}

async fn keygen(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)?;

    let master = generate_master_key_async().await?;
    let (identity, identity_sig) = generate_identity_key(&master)?;
    let (account, account_sig) = generate_account_key(&identity)?;

    write(&dir.join(MASTER_PUBLIC), master.public.to_json()?)?;
    write_secret(&dir.join(MASTER_PRIVATE), master.private.to_json()?)?;
    write(&dir.join(IDENTITY_PUBLIC), identity.public.to_json()?)?;
    write_secret(&dir.join(IDENTITY_PRIVATE), identity.private.to_json()?)?;
    write(&dir.join(IDENTITY_SIGNATURE), identity_sig.to_json()?)?;
    write(&dir.join(ACCOUNT_PUBLIC), account.public.to_json()?)?;
    write_secret(&dir.join(ACCOUNT_PRIVATE), account.private.to_json()?)?;
    write(&dir.join(ACCOUNT_SIGNATURE), account_sig.to_json()?)?;

    tracing::info!(
        dir = %dir.display(),
        master = %master.public.key_hash_hex(),
        "key chain written"
    );
    Ok(())
}

fn validate_file(key_type: &str, file: &Path) -> anyhow::Result<bool> {
    let Some(kind) = KeyType::parse(key_type) else {
        bail!("unknown key type: {key_type}");
    };
    Ok(validate(kind, &read(file)?))
}

fn verify_chain(dir: &Path) -> anyhow::Result<String> {
    let keys = ParticipantKeys {
        principal_id: dir.display().to_string(),
        master_key_public: read(&dir.join(MASTER_PUBLIC))?,
        identity_key_public: read(&dir.join(IDENTITY_PUBLIC))?,
        identity_key_signature: read(&dir.join(IDENTITY_SIGNATURE))?,
        account_key_public: read(&dir.join(ACCOUNT_PUBLIC))?,
        account_key_signature: read(&dir.join(ACCOUNT_SIGNATURE))?,
    };
    let verified = verify_participant(&keys)?;
    Ok(verified.master_key_hash_hex())
}

async fn seal(to: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let plaintext = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let envelope = match AnyKey::from_json(&read(to)?)? {
        AnyKey::AccountKeyPublic(k) => encrypt_for_async(k, plaintext).await?,
        AnyKey::KeyShareKeyPublic(k) => encrypt_for_async(k, plaintext).await?,
        AnyKey::MigrateKeyPublic(k) => encrypt_for_async(k, plaintext).await?,
        AnyKey::RoomKey(k) => encrypt_for_async(k, plaintext).await?,
        AnyKey::DeviceKey(k) => encrypt_for_async(k, plaintext).await?,
        other => bail!("{} cannot receive encrypted data", other.key_type()),
    };
    write(output, envelope.to_json()?)
}

async fn open(key: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let envelope = EncryptedEnvelope::from_json(&read(input)?)?;
    let plaintext = match AnyKey::from_json(&read(key)?)? {
        AnyKey::AccountKeyPrivate(k) => decrypt_with_async(k, envelope).await?,
        AnyKey::KeyShareKeyPrivate(k) => decrypt_with_async(k, envelope).await?,
        AnyKey::MigrateKeyPrivate(k) => decrypt_with_async(k, envelope).await?,
        AnyKey::RoomKey(k) => decrypt_with_async(k, envelope).await?,
        AnyKey::DeviceKey(k) => decrypt_with_async(k, envelope).await?,
        other => bail!("{} cannot decrypt", other.key_type()),
    };
    write(output, plaintext)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ProtocolConfig::load(cli.config.as_deref())?;
    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Keygen { dir } => keygen(&dir).await?,

        Commands::Validate { key_type, file } => {
            if validate_file(&key_type, &file)? {
                println!("valid {key_type}");
            } else {
                bail!("{} is not a valid {key_type}", file.display());
            }
        }

        Commands::VerifyChain { dir } => {
            let master_hash = verify_chain(&dir)?;
            println!("chain ok, master key {master_hash}");
        }

        Commands::Seal { to, input, output } => seal(&to, &input, &output).await?,

        Commands::Open { key, input, output } => open(&key, &input, &output).await?,

        Commands::DeviceKey { output } => {
            write_secret(&output, generate_device_key()?.to_json()?)?;
            tracing::info!(output = %output.display(), "device key written");
        }

        Commands::Version => {
            println!("takos {}", env!("CARGO_PKG_VERSION"));
            println!("Protocol version: {}", takos_core::PROTOCOL_VERSION);
            println!("Signatures: ML-DSA-65 (FIPS 204)");
            println!("Key encapsulation: ML-KEM-768 (FIPS 203)");
            println!("Symmetric: AES-256-GCM");
        }
    }

    Ok(())
}

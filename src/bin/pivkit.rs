use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tracing_subscriber::EnvFilter;

use pivkit::{Algorithm, Card, GenerateKeyOpts, ManagementKey, PcscDriver, PinPolicy, TouchPolicy};

#[derive(Parser, Debug)]
#[command(name = "pivkit")]
#[command(about = "YubiKey PIV slot and key management", version)]
struct Cli {
    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List connected cards and their slots
    List,

    /// Show selected slots of a card
    Slots {
        /// Card serial number
        #[arg(long)]
        serial: String,

        /// Slot keys to resolve (defaults to all well-known slots)
        #[arg(long)]
        slot: Vec<String>,

        /// Card PIN
        #[arg(long)]
        pin: Option<String>,
    },

    /// Generate a new asymmetric key in a slot
    Generate {
        /// Card serial number
        #[arg(long)]
        serial: String,

        /// Slot key (9a, 9c, 9d, 9e, 82..95)
        #[arg(long)]
        slot: String,

        /// Key algorithm
        #[arg(long, default_value = "p256")]
        algorithm: AlgorithmArg,

        /// PIN policy (never, once, always)
        #[arg(long, default_value = "once")]
        pin_policy: PinPolicyArg,

        /// Touch policy (never, always, cached)
        #[arg(long, default_value = "never")]
        touch_policy: TouchPolicyArg,

        /// Replace an existing key
        #[arg(long)]
        overwrite: bool,

        /// Management key in hex (48 hex chars = 24 bytes); uses the
        /// default if not provided
        #[arg(long)]
        mgmt_key: Option<String>,
    },

    /// Derive an ECDH shared key against a compressed peer public key
    SharedKey {
        /// Card serial number
        #[arg(long)]
        serial: String,

        /// Slot key
        #[arg(long)]
        slot: String,

        /// Peer public key in hex (compressed, 33 or 49 bytes)
        #[arg(long)]
        peer: String,

        /// Card PIN
        #[arg(long)]
        pin: Option<String>,
    },

    /// Verify the card PIN
    VerifyPin {
        #[arg(long)]
        serial: String,

        #[arg(long)]
        pin: String,
    },

    /// Unblock the PIN with the PUK, setting a new PIN
    Unblock {
        #[arg(long)]
        serial: String,

        #[arg(long)]
        puk: String,

        #[arg(long)]
        new_pin: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    P256,
    P384,
    Ed25519,
    Rsa1024,
    Rsa2048,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::P256 => Algorithm::Ec256,
            AlgorithmArg::P384 => Algorithm::Ec384,
            AlgorithmArg::Ed25519 => Algorithm::Ed25519,
            AlgorithmArg::Rsa1024 => Algorithm::Rsa1024,
            AlgorithmArg::Rsa2048 => Algorithm::Rsa2048,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PinPolicyArg {
    Never,
    Once,
    Always,
}

impl From<PinPolicyArg> for PinPolicy {
    fn from(arg: PinPolicyArg) -> Self {
        match arg {
            PinPolicyArg::Never => PinPolicy::Never,
            PinPolicyArg::Once => PinPolicy::Once,
            PinPolicyArg::Always => PinPolicy::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TouchPolicyArg {
    Never,
    Always,
    Cached,
}

impl From<TouchPolicyArg> for TouchPolicy {
    fn from(arg: TouchPolicyArg) -> Self {
        match arg {
            TouchPolicyArg::Never => TouchPolicy::Never,
            TouchPolicyArg::Always => TouchPolicy::Always,
            TouchPolicyArg::Cached => TouchPolicy::Cached,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = cli.verbosity.log_level_filter().to_string().to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => list(),
        Commands::Slots { serial, slot, pin } => slots(&serial, &slot, pin.as_deref()),
        Commands::Generate {
            serial,
            slot,
            algorithm,
            pin_policy,
            touch_policy,
            overwrite,
            mgmt_key,
        } => generate(
            &serial,
            &slot,
            GenerateKeyOpts {
                overwrite,
                algorithm: algorithm.into(),
                pin_policy: pin_policy.into(),
                touch_policy: touch_policy.into(),
                management_key: mgmt_key.as_deref().map(parse_mgmt_key).transpose()?,
            },
        ),
        Commands::SharedKey {
            serial,
            slot,
            peer,
            pin,
        } => shared_key(&serial, &slot, &peer, pin.as_deref()),
        Commands::VerifyPin { serial, pin } => find_card(&serial)?
            .verify_pin(&pin)
            .map_err(Into::into),
        Commands::Unblock {
            serial,
            puk,
            new_pin,
        } => find_card(&serial)?
            .unblock(&puk, &new_pin)
            .map_err(Into::into),
    }
}

fn find_card(serial: &str) -> anyhow::Result<Card<PcscDriver>> {
    pivkit::cards()?
        .into_iter()
        .find(|card| card.serial() == serial)
        .ok_or_else(|| anyhow!("key not found: {serial}"))
}

fn parse_mgmt_key(hex_key: &str) -> anyhow::Result<ManagementKey> {
    let bytes = hex::decode(hex_key).context("management key is not valid hex")?;
    ManagementKey::from_slice(&bytes).map_err(Into::into)
}

fn list() -> anyhow::Result<()> {
    for card in pivkit::cards()? {
        println!(
            "{} (serial {}, firmware {})",
            card.name(),
            card.serial(),
            card.version()
        );
        print_slots(&card.slots()?);
    }
    Ok(())
}

fn slots(serial: &str, keys: &[String], pin: Option<&str>) -> anyhow::Result<()> {
    let card = find_card(serial)?;
    if let Some(pin) = pin {
        card.set_pin(pin);
    }
    let slots = if keys.is_empty() {
        card.slots()?
    } else {
        card.slots_by_key(keys)?
    };
    print_slots(&slots);
    Ok(())
}

fn print_slots(slots: &[pivkit::Slot<PcscDriver>]) {
    for slot in slots {
        if !slot.has_key() {
            println!("  {}: empty", slot.key());
            continue;
        }
        let origin = if slot.is_generated() {
            "generated"
        } else {
            "imported"
        };
        println!(
            "  {}: {} {} pin={} touch={} public-key={}",
            slot.key(),
            origin,
            slot.public_key_algorithm(),
            slot.pin_policy(),
            slot.touch_policy(),
            hex::encode(slot.public_key()),
        );
    }
}

fn generate(serial: &str, key: &str, opts: GenerateKeyOpts) -> anyhow::Result<()> {
    let card = find_card(serial)?;
    let slots = card.slots_by_key(&[key])?;
    let slot = slots
        .first()
        .ok_or_else(|| anyhow!("key slot not found: {serial}:{key}"))?;
    slot.generate_key(opts)?;
    println!("generated key in slot {key}");
    Ok(())
}

fn shared_key(serial: &str, key: &str, peer_hex: &str, pin: Option<&str>) -> anyhow::Result<()> {
    let peer = hex::decode(peer_hex).context("peer public key is not valid hex")?;
    let slot = pivkit::card_slot(serial, key, pin.unwrap_or_default())?;
    let shared = slot.shared_key(&peer)?;
    println!("{}", hex::encode(shared));
    Ok(())
}

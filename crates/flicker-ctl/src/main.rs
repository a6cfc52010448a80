//! flicker — send and receive payments over animated QR codes.

use anyhow::Result;
use clap::{Parser, Subcommand};

use flicker_core::config::FlickerConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "flicker")]
#[command(about = "Move payment envelopes across a screen-to-camera channel", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode an envelope JSON file into the base64 payload
    Encode {
        /// Envelope JSON file, or - for stdin
        input: String,
    },

    /// Decode a base64 payload into envelope JSON
    Decode {
        /// Payload text, or - for stdin
        input: String,
    },

    /// Print the frame texts a payload is transmitted as
    Chunk {
        /// Payload text, or - for stdin
        input: String,
    },

    /// Parse one frame text
    Parse {
        text: String,
    },

    /// Cycle a payload's frames as QR codes in this terminal until Ctrl-C
    Transmit {
        /// Payload text, or - for stdin
        input: String,
    },

    /// Read decoded QR text lines from stdin and reassemble a payment
    Receive {
        /// Print the raw payload instead of envelope JSON
        #[arg(long)]
        raw: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = FlickerConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        FlickerConfig::default()
    });

    match cli.command {
        Commands::Encode { input } => cmd::codec::cmd_encode(&input),
        Commands::Decode { input } => cmd::codec::cmd_decode(&input),
        Commands::Chunk { input } => cmd::chunk::cmd_chunk(&input, &config),
        Commands::Parse { text } => cmd::chunk::cmd_parse(&text),
        Commands::Transmit { input } => cmd::transmit::cmd_transmit(&input, &config).await,
        Commands::Receive { raw } => cmd::receive::cmd_receive(raw, &config).await,
        Commands::Config { init } => cmd::cmd_config(&config, init),
    }
}

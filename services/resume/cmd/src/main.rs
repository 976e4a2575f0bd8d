//! bgp-resume binary.
//!
//! Encodes a resume into BGP large communities, builds the UPDATE message
//! that advertises them, and decodes them again from router output.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand, ValueEnum};
use resume_wire::{
    CommunityCodec, LargeCommunity, Prefix, TracingObserver, UpdateMessage,
    EXTENDED_MAX_MESSAGE_SIZE, MAX_MESSAGE_SIZE,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[macro_use]
mod logging;
mod config;
mod dump;

use config::ResumeConfig;
use dump::DumpFormat;
use logging::ResumeLogFormatter;

/// Hide a resume in BGP large communities and read it back
#[derive(Parser, Debug)]
#[command(name = "bgp-resume", version, about = "Hide a resume in BGP large communities")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Configuration file path
    #[arg(long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the communities that carry the resume
    Encode {
        /// Path to resume file
        #[arg(long)]
        resume: Option<PathBuf>,

        /// ASN used as the community tag
        #[arg(long)]
        asn: Option<u32>,

        /// Output notation
        #[arg(long, value_enum, default_value_t = OutputFormat::Bird)]
        output: OutputFormat,

        /// Encode the file as-is instead of base64-armouring it
        #[arg(long)]
        raw: bool,
    },

    /// Build the BGP UPDATE message that advertises the resume
    Update {
        /// Path to resume file
        #[arg(long)]
        resume: Option<PathBuf>,

        /// ASN used as the community tag
        #[arg(long)]
        asn: Option<u32>,

        /// Prefix to announce, e.g. 2001:db8::/48
        #[arg(long)]
        prefix: Option<String>,

        /// Next hop for the prefix (local peering address)
        #[arg(long)]
        next_hop: Option<IpAddr>,

        /// Allow messages up to 65535 bytes (RFC 8654 extended messages)
        #[arg(long)]
        extended: bool,

        /// Write the raw message here instead of hex to stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Encode the file as-is instead of base64-armouring it
        #[arg(long)]
        raw: bool,
    },

    /// Recover the resume from router output on stdin
    Decode {
        /// ASN to filter communities by
        #[arg(long)]
        asn: Option<u32>,

        /// Input format
        #[arg(long, value_enum)]
        format: DumpFormat,

        /// Print the decoded bytes without base64-unarmouring them
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `(asn, data1, data2)` per line
    Bird,
    /// `asn:data1:data2` per line
    Colon,
    /// JSON array
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("bgp_resume={}", args.log_level).parse()?)
        .add_directive(format!("resume_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(ResumeLogFormatter::new("bgp-resume".to_string()))
        .init();

    info!("Starting bgp-resume v{}", env!("CARGO_PKG_VERSION"));

    let config = ResumeConfig::load_from_file(&args.config)?;

    match args.command {
        Command::Encode {
            resume,
            asn,
            output,
            raw,
        } => {
            let asn = required(asn.or(config.asn), "asn")?;
            let resume = required(resume.or(config.resume), "resume")?;

            let communities = encode_resume(&resume, asn, raw).await?;
            write_stdout(render(&communities, output)?.as_bytes()).await?;
        }

        Command::Update {
            resume,
            asn,
            prefix,
            next_hop,
            extended,
            out,
            raw,
        } => {
            let asn = required(asn.or(config.asn), "asn")?;
            let resume = required(resume.or(config.resume), "resume")?;
            let prefix: Prefix = required(prefix.or(config.prefix), "prefix")?.parse()?;
            let next_hop = match next_hop {
                Some(addr) => addr,
                None => required(config.next_hop, "next-hop")?
                    .parse()
                    .context("invalid next hop address")?,
            };

            let communities = encode_resume(&resume, asn, raw).await?;
            let max_size = if extended || config.extended_messages {
                EXTENDED_MAX_MESSAGE_SIZE
            } else {
                MAX_MESSAGE_SIZE
            };

            let message = UpdateMessage::announce(prefix, next_hop, communities)?
                .encode(max_size)
                .with_context(|| {
                    format!(
                        "UPDATE does not fit in {} bytes (try --extended or a shorter resume)",
                        max_size
                    )
                })?;
            component_info!(
                "update",
                "Built UPDATE for {} via {}: {} bytes",
                prefix,
                next_hop,
                message.len()
            );

            match out {
                Some(path) => {
                    tokio::fs::write(&path, &message)
                        .await
                        .with_context(|| format!("failed to write {:?}", path))?;
                    info!("Wrote UPDATE message to {:?}", path);
                }
                None => write_stdout(format!("{}\n", hex::encode(&message)).as_bytes()).await?,
            }
        }

        Command::Decode { asn, format, raw } => {
            let asn = required(asn.or(config.asn), "asn")?;

            let mut input = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut input)
                .await
                .context("failed to read stdin")?;

            let communities = dump::scan(format, &input)?;
            let matching = communities.iter().filter(|c| c.global_admin == asn).count();
            component_info!(
                "dump",
                "Found {} communities, {} tagged with {}",
                communities.len(),
                matching,
                asn
            );
            if matching == 0 {
                component_warn!("dump", "No communities tagged with {}", asn);
            }

            let codec = CommunityCodec::new(asn).with_observer(Arc::new(TracingObserver));
            let decoded = codec.decode(&communities)?;

            let mut text = if raw {
                decoded
            } else {
                STANDARD
                    .decode(String::from_utf8_lossy(&decoded).trim())
                    .context("decoded payload is not valid base64")?
            };
            if !text.ends_with(b"\n") {
                text.push(b'\n');
            }
            write_stdout(&text).await?;
        }
    }

    Ok(())
}

/// A value that may come from flags or config, naming the flag when absent
fn required<T>(value: Option<T>, flag: &str) -> Result<T> {
    value.with_context(|| format!("missing --{} (or set it in the config file)", flag))
}

/// Read the resume and encode it, base64-armoured unless `raw`
async fn encode_resume(path: &Path, asn: u32, raw: bool) -> Result<Vec<LargeCommunity>> {
    let contents = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read resume file {:?}", path))?;

    let payload = if raw {
        contents
    } else {
        STANDARD.encode(&contents).into_bytes()
    };
    component_debug!("codec", "Encoding {} payload bytes from {:?}", payload.len(), path);

    let codec = CommunityCodec::new(asn).with_observer(Arc::new(TracingObserver));
    let communities = codec.encode(&payload)?;
    component_info!(
        "codec",
        "Converted {} bytes into {} communities",
        payload.len(),
        communities.len()
    );

    Ok(communities)
}

fn render(communities: &[LargeCommunity], output: OutputFormat) -> Result<String> {
    let rendered: String = match output {
        OutputFormat::Bird => communities
            .iter()
            .map(|c| format!("{}\n", c.to_bird()))
            .collect(),
        OutputFormat::Colon => communities.iter().map(|c| format!("{}\n", c)).collect(),
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(communities)?),
    };
    Ok(rendered)
}

async fn write_stdout(bytes: &[u8]) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(bytes).await?;
    stdout.flush().await?;
    Ok(())
}

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use blitzkit::container::{json_to_ascii, Replay, INNER_MAGIC};
use blitzkit::text;

#[derive(Parser)]
#[command(name = "blitzkit", version = "1.0.0", about = "The .wotreplay codec CLI")]
struct Cli {
    /// Log progress diagnostics, not just warnings
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack a replay into JSON metadata and a raw packet stream
    Unpack {
        replay: PathBuf,
        /// First JSON metadata document
        #[arg(short = '1', long = "first")]
        first: PathBuf,
        /// Second JSON metadata document (left uncreated if the replay
        /// carries only one block)
        #[arg(short = '2', long = "second")]
        second: PathBuf,
        /// Decoded packet stream
        #[arg(short = 'p', long = "packets")]
        packets: PathBuf,
    },
    /// Pack JSON metadata and a packet stream back into a replay
    Pack {
        #[arg(short = '1', long = "first")]
        first: PathBuf,
        #[arg(short = '2', long = "second")]
        second: Option<PathBuf>,
        #[arg(short = 'p', long = "packets")]
        packets: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Disassemble a packet stream into its editable textual form
    Dis {
        packets: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Assemble a packet stream from its textual form
    Asm {
        text: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default()
            .default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .format_timestamp(None)
    .init();

    match cli.command {

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { replay, first, second, packets } => {
            let decoded = Replay::read(BufReader::new(File::open(&replay)?))?;

            std::fs::write(&first, json_to_ascii(&decoded.json_blocks[0]))?;
            if let Some(block) = decoded.json_blocks.get(1) {
                std::fs::write(&second, json_to_ascii(block))?;
            }
            std::fs::write(&packets, &decoded.packets)?;
            log::debug!(
                "unpacked {} json block(s) and {} packet bytes",
                decoded.json_blocks.len(),
                decoded.packets.len()
            );
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { first, second, packets, output } => {
            let mut json_blocks = vec![serde_json::from_slice(&std::fs::read(&first)?)?];
            if let Some(second) = second {
                json_blocks.push(serde_json::from_slice(&std::fs::read(&second)?)?);
            }
            let replay = Replay {
                json_blocks,
                inner_magic: INNER_MAGIC,
                packets: std::fs::read(&packets)?,
            };
            let mut w = BufWriter::new(File::create(&output)?);
            replay.write(&mut w)?;
            w.flush()?;
        }

        // ── Dis ──────────────────────────────────────────────────────────────
        Commands::Dis { packets, output } => {
            let mut w = BufWriter::new(File::create(&output)?);
            text::disassemble(BufReader::new(File::open(&packets)?), &mut w)?;
            w.flush()?;
        }

        // ── Asm ──────────────────────────────────────────────────────────────
        Commands::Asm { text: input, output } => {
            let mut w = BufWriter::new(File::create(&output)?);
            text::assemble(BufReader::new(File::open(&input)?), &mut w)?;
            w.flush()?;
        }
    }

    Ok(())
}

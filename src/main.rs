use clap::{Parser, Subcommand};
use protopack::{ChunkReader, PackError, PackReader, PackWriter};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ppack", about = "The protopack container format CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream metadata and per-section totals
    Info {
        input: PathBuf,
        /// Emit the full summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the types a stream declares
    Types {
        input: PathBuf,
    },
    /// Dump entries with payload previews
    Dump {
        input: PathBuf,
        /// Preview bytes shown per payload
        #[arg(short, long, default_value = "16")]
        preview: usize,
        /// Walk framing-level chunks instead of resolved entries
        #[arg(long)]
        raw: bool,
    },
    /// Rewrite a pack entry by entry, dropping what cannot be resolved
    Copy {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let summary = protopack::summarize_file(&input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("── protopack stream ─────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Version        {}", summary.version);
            println!("  Header bytes   {}", summary.header_bytes);
            println!("  Stream bytes   {}", summary.stream_bytes);
            println!(
                "  Chunks         {} ({} declaration(s), {} entry(s))",
                summary.chunk_count, summary.declaration_count, summary.entry_count
            );
            println!("  Payload bytes  {}", summary.payload_bytes);
            println!("  Types          {}", summary.types.len());
            if summary.unresolved_entries > 0 {
                println!("  Unresolved     {}", summary.unresolved_entries);
            }
            if summary.malformed_chunks > 0 {
                println!("  Malformed      {}", summary.malformed_chunks);
            }
            if summary.truncated {
                println!("  Truncated      yes");
            }
            println!("  Sections ({}):", summary.sections.len());
            for section in &summary.sections {
                println!(
                    "    id={:<6} chunks={:<6} bytes={}",
                    section.id, section.chunks, section.payload_bytes
                );
            }
            println!("{}", summary.summary());
        }

        // ── Types ────────────────────────────────────────────────────────────
        Commands::Types { input } => {
            let summary = protopack::summarize_file(&input)?;
            println!("Pack: {}", input.display());
            println!("{:<6} {:<30} {:>9} {:>8}", "ID", "Name", "Schema B", "Entries");
            for t in &summary.types {
                println!(
                    "{:<6} {:<30} {:>9} {:>8}",
                    t.id, t.name, t.schema_len, t.entries
                );
            }
        }

        // ── Dump ─────────────────────────────────────────────────────────────
        Commands::Dump { input, preview, raw } => {
            println!("Pack: {}", input.display());
            if raw {
                // Framing-level walk: no type resolution, declarations shown
                // as ordinary section-0 chunks.
                let mut file = BufReader::new(File::open(&input)?);
                let (version, header_bytes) = protopack::header::read_version(&mut file)?;
                println!("Version: {version}");
                println!("{:>10}  {:>6} {:>9}  Payload", "Offset", "Sec", "Bytes");
                let mut chunks = ChunkReader::at_offset(file, header_bytes);
                while let Some(chunk) = chunks.next_chunk()? {
                    println!(
                        "{:>10}  {:>6} {:>9}  {}",
                        chunk.offset,
                        chunk.section,
                        chunk.payload.len(),
                        payload_hex(&chunk.payload, preview),
                    );
                }
                return Ok(());
            }

            let mut reader = PackReader::new(BufReader::new(File::open(&input)?))?;
            println!(
                "{:>10}  {:>4} {:>5}  {:<24} {:>9}  Payload",
                "Offset", "Sec", "Type", "Name", "Bytes"
            );
            loop {
                match reader.next_entry() {
                    Ok(Some(entry)) => {
                        println!(
                            "{:>10}  {:>4} {:>5}  {:<24} {:>9}  {}",
                            entry.offset,
                            entry.section,
                            entry.type_id,
                            entry.descriptor.name,
                            entry.payload.len(),
                            payload_hex(&entry.payload, preview),
                        );
                    }
                    Ok(None) => break,
                    Err(e @ PackError::UnknownType { .. }) => eprintln!("  skipped: {e}"),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        // ── Copy ─────────────────────────────────────────────────────────────
        Commands::Copy { input, output } => {
            let mut reader = PackReader::new(BufReader::new(File::open(&input)?))?;
            let mut writer = PackWriter::new(BufWriter::new(File::create(&output)?))?;

            let mut copied = 0usize;
            let mut skipped = 0usize;
            loop {
                match reader.next_entry() {
                    Ok(Some(entry)) => {
                        writer.append(entry.section, &entry.descriptor, &entry.payload)?;
                        copied += 1;
                    }
                    Ok(None) => break,
                    Err(e @ PackError::UnknownType { .. }) => {
                        eprintln!("  skipped: {e}");
                        skipped += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            writer.close()?;
            println!(
                "Copied {} entry(s) to {} ({} skipped)",
                copied,
                output.display(),
                skipped
            );
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn payload_hex(payload: &[u8], preview: usize) -> String {
    if payload.len() <= preview {
        hex::encode(payload)
    } else {
        format!("{}..", hex::encode(&payload[..preview]))
    }
}

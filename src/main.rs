use clap::{Parser, Subcommand};
use plank::codec::DEFAULT_COMPRESSION_LEVEL;
use plank::{decode, encode, inspect, DecodeOptions, EncodeOptions, Entry};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plank", about = "The .plank container format CLI")]
struct Cli {
    /// Log every stage of encoding/decoding
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack one or more files into a .plank container
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Encrypt every entry with AES-256-GCM; the key is printed once
        #[arg(short, long)]
        encrypt: bool,
        /// Zstd-compress every entry
        #[arg(short, long)]
        compress: bool,
        /// Zstd level (1-19)
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
        /// Do not store file names
        #[arg(long)]
        no_names: bool,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Unpack a .plank container
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        /// Hex key printed by `pack --encrypt`
        #[arg(short, long)]
        key: Option<String>,
        /// Skip sha256 verification of every entry
        #[arg(long)]
        no_verify: bool,
    },
    /// List container entries
    List {
        input: PathBuf,
    },
    /// Show container layout
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, encrypt, compress, level, no_names, input } => {
            let mut entries = Vec::with_capacity(input.len());
            for path in &input {
                let data = std::fs::read(path)?;
                info!(path = %path.display(), size = data.len(), "read input");
                entries.push(if no_names {
                    Entry::new(data)
                } else {
                    Entry::named(file_name(path)?, data)
                });
            }
            let encoded = encode(&entries, &EncodeOptions { encrypt, compress, level })?;
            std::fs::write(&output, &encoded.buffer)?;
            println!("Created: {} ({} entries)", output.display(), entries.len());
            if let Some(key) = encoded.key_hex() {
                println!("Key:     {key}");
                println!("Store this key; the container cannot be opened without it.");
            }
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir, key, no_verify } => {
            let buffer = std::fs::read(&input)?;
            let decoded = decode(&buffer, &DecodeOptions { key, verify: !no_verify })?;
            std::fs::create_dir_all(&output_dir)?;
            for (index, entry) in decoded.into_entries().into_iter().enumerate() {
                let name = entry
                    .name
                    .as_deref()
                    .and_then(|n| Path::new(n).file_name())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(index.to_string()));
                let dest = output_dir.join(name);
                std::fs::write(&dest, &entry.data)?;
                println!("  wrote  {}", dest.display());
            }
            println!("Unpacked to: {}", output_dir.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input } => {
            let info = inspect(&std::fs::read(&input)?)?;
            println!("Container: {}", input.display());
            println!("{:<26} {:>12}  sha256", "Name", "Stored");
            let names = info.trailer.filenames.clone();
            for (index, (size, hash)) in info.stored_sizes().iter().zip(&info.trailer.hashes).enumerate() {
                let name = names
                    .as_ref()
                    .map(|n| n[index].clone())
                    .unwrap_or_else(|| format!("#{index}"));
                println!("{:<26} {:>12}  {}", name, size, hash);
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let buffer = std::fs::read(&input)?;
            let info = inspect(&buffer)?;

            println!("── .plank Container ─────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Size           {} B", buffer.len());
            println!("  Filenames      {}", info.flags.has_filenames());
            println!("  Encrypted      {}", info.flags.is_encrypted());
            println!("  Compressed     {}", info.flags.is_compressed());
            println!("  Entries        {}", info.entry_count());
            println!("  Table size     {} B", info.offsets.size_field());
            println!("  Trailer size   {} B", info.trailer_len);
            println!("  Offsets:");
            for (index, pair) in info.offsets.pairs().iter().enumerate() {
                println!("    {:>4}  {:#010x} ..= {:#010x}", index, pair.start, pair.end);
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "plank=debug" } else { "plank=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn file_name(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let name = path
        .file_name()
        .ok_or_else(|| format!("input has no file name: {}", path.display()))?;
    Ok(name.to_string_lossy().into_owned())
}

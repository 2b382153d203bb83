//! Thin CLI surface over the gcc-ocf library. Every subcommand here is a
//! direct pass-through to a library entry point, with `GccError::exit_code()`
//! as the only place a `GccError` becomes a process exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use gcc_ocf::dirpack::{
    self, pack_dir_classic, pack_dir_single_mixed, pack_dir_single_text_only, unpack_dir_classic, walk_files,
    DirPackOptions, DirPipelineSpec,
};
use gcc_ocf::error::GccError;
use gcc_ocf::gca::{describe as describe_gca, GcaReader};
use gcc_ocf::pipeline::PipelineSpec;
use gcc_ocf::verify::{self, VerifyLevel};
use gcc_ocf::{compress_with_pipeline, decode_file};

#[derive(Parser)]
#[command(name = "gcc-ocf", version, about = "The v6 GCC container / MBN bundle / GCA1 archive CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a single file into a v6 container under a pipeline spec.
    Pack {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Path to a JSON pipeline spec (schema gcc-ocf.pipeline.v1).
        #[arg(short, long)]
        pipeline: PathBuf,
    },
    /// Decompress a v6 (or legacy) container back to its original bytes.
    Unpack {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Verify a single container or GCA1 archive without necessarily
    /// materializing its decompressed output.
    Verify {
        input: PathBuf,
        /// Recompute hashes, not just structure (GCA1 archives only; a bare
        /// container is always verified at the level requested).
        #[arg(long)]
        full: bool,
    },
    /// Show layer/codec/stream identifiers for a container, or the blob and
    /// resource table for a GCA1 archive, without decompressing payloads.
    Info { input: PathBuf },
    /// Pack a directory: bucketed GCA1 archives (classic mode) or a single
    /// self-contained bundle (text-only / mixed mode).
    DirPack {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Path to a JSON directory pipeline spec (schema
        /// gcc-ocf.dir_pipeline.v1). Required for classic mode; ignored for
        /// text-only/mixed.
        #[arg(short, long)]
        pipeline: Option<PathBuf>,
        #[arg(long, default_value = "classic")]
        mode: String,
    },
    /// Verify a classic-mode directory pack (manifest + per-bucket
    /// archives) under `output`.
    DirVerify {
        input: PathBuf,
        #[arg(long)]
        full: bool,
    },
    /// Unpack a classic-mode directory pack back to its original files.
    DirUnpack {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn run() -> Result<(), GccError> {
    match Cli::parse().command {
        Commands::Pack { input, output, pipeline } => {
            let data = std::fs::read(&input)?;
            let spec_json = std::fs::read_to_string(&pipeline)?;
            let spec: PipelineSpec = serde_json::from_str(&spec_json)?;
            let container_bytes = compress_with_pipeline(&data, &spec)?;
            std::fs::write(&output, &container_bytes)?;
            println!(
                "packed {} -> {} ({} B -> {} B)",
                input.display(),
                output.display(),
                data.len(),
                container_bytes.len()
            );
            Ok(())
        }

        Commands::Unpack { input, output } => {
            let container_bytes = std::fs::read(&input)?;
            let data = decode_file(&container_bytes)?;
            std::fs::write(&output, &data)?;
            println!("unpacked {} -> {} ({} B)", input.display(), output.display(), data.len());
            Ok(())
        }

        Commands::Verify { input, full } => {
            let level = if full { VerifyLevel::Full } else { VerifyLevel::Light };
            let buf = std::fs::read(&input)?;
            if looks_like_gca(&buf) {
                verify::verify_archive(&buf, level)?;
            } else {
                verify::verify_container(&buf, level)?;
            }
            println!("{}: OK ({})", input.display(), if full { "full" } else { "light" });
            Ok(())
        }

        Commands::Info { input } => {
            let buf = std::fs::read(&input)?;
            if looks_like_gca(&buf) {
                let reader = GcaReader::open(&buf)?;
                println!("{}", describe_gca(&reader));
                for entry in reader.iter_entries() {
                    println!("  {:>10} @ {:<10} {}", entry.length, entry.offset, entry.rel);
                }
            } else {
                let version = gcc_ocf::container::peek_version(&buf)?;
                if version == 6 {
                    let c = gcc_ocf::container::decode(&buf)?;
                    println!("v6 container: layer_code={} codec_code={} flags={:#04x}", c.layer_code, c.codec_code, c.flags);
                    println!("  meta: {} B, payload: {} B", c.meta.len(), c.payload.len());
                } else {
                    let legacy = gcc_ocf::container::decode_legacy(version, &buf)?;
                    println!(
                        "legacy v{} container: layer_code={} codec_code={} kind={}",
                        legacy.version, legacy.layer_code, legacy.codec_code, legacy.kind
                    );
                }
            }
            Ok(())
        }

        Commands::DirPack { input, output, pipeline, mode } => {
            let files = walk_files(&input)?;
            std::fs::create_dir_all(&output)?;
            match mode.as_str() {
                "classic" => {
                    let pipeline = pipeline
                        .ok_or_else(|| GccError::usage("dir-pack classic mode requires --pipeline"))?;
                    let spec_json = std::fs::read_to_string(&pipeline)?;
                    let dir_spec: DirPipelineSpec = serde_json::from_str(&spec_json)?;
                    let opts: DirPackOptions = dirpack::dir_pack_options_from_spec(&dir_spec)?;
                    pack_dir_classic(&files, &output, &opts)?;
                    println!("packed {} file(s) from {} into {}", files.len(), input.display(), output.display());
                }
                "text-only" => {
                    let (container_bytes, index) = pack_dir_single_text_only(&files)?;
                    std::fs::write(output.join("bundle.gcc"), &container_bytes)?;
                    std::fs::write(output.join("bundle_index.json"), serde_json::to_string_pretty(&index)?)?;
                    println!("packed {} file(s) into {}/bundle.gcc", files.len(), output.display());
                }
                "mixed" => {
                    let (text_bundle, bin_bundle) = pack_dir_single_mixed(&files)?;
                    if let Some((bytes, index)) = text_bundle {
                        std::fs::write(output.join("bundle_text.gcc"), &bytes)?;
                        std::fs::write(output.join("bundle_text_index.json"), serde_json::to_string_pretty(&index)?)?;
                    }
                    if let Some((bytes, index)) = bin_bundle {
                        std::fs::write(output.join("bundle_bin.gcc"), &bytes)?;
                        std::fs::write(output.join("bundle_bin_index.json"), serde_json::to_string_pretty(&index)?)?;
                    }
                    println!("packed {} file(s) into {} (mixed mode)", files.len(), output.display());
                }
                other => return Err(GccError::usage(format!("unknown dir-pack mode {other:?}"))),
            }
            Ok(())
        }

        Commands::DirVerify { input, full } => {
            let level = if full { VerifyLevel::Full } else { VerifyLevel::Light };
            verify::verify_dir_classic(&input, level)?;
            println!("{}: OK ({})", input.display(), if full { "full" } else { "light" });
            Ok(())
        }

        Commands::DirUnpack { input, output } => {
            std::fs::create_dir_all(&output)?;
            unpack_dir_classic(&input, &output)?;
            println!("unpacked {} -> {}", input.display(), output.display());
            Ok(())
        }
    }
}

/// A GCA1 archive has no leading magic (its identity lives in the trailing
/// 16 bytes) and a v6/legacy container always starts with `"GCC"`, so the
/// absence of that prefix is enough to tell them apart on this CLI's inputs.
fn looks_like_gca(buf: &[u8]) -> bool {
    buf.len() >= 16 && &buf[buf.len() - 16..buf.len() - 12] == b"GCA1"
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

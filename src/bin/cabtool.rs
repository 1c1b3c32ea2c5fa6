//
// Copyright 2025 cabfile Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Command-line front end for building and inspecting cabfile archives.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cabfile::pack::{self, PackerType, STRATEGY_REGISTER};
use cabfile::ser::{self, ArchiveOptions, DictionaryKind};
use cabfile::Archive;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate that the given files are well-formed JSON.
    CheckJs(CheckJsArgs),

    /// Convert a JSON document into an archive.
    Convert(ConvertArgs),

    /// Print the structure of an archive.
    ViewCab(ArchiveArgs),

    /// Print the section sizes of an archive.
    Inspect(ArchiveArgs),

    /// Convert an archive back into JSON.
    CabToJs(ArchiveArgs),

    /// Enumerate registered components.
    List(ListArgs),
}

#[derive(Args)]
struct CheckJsArgs {
    /// JSON files to validate.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct ConvertArgs {
    /// Path of the archive to create.
    output: PathBuf,

    /// JSON document to convert.
    input: PathBuf,

    /// Overwrite the output file if it exists.
    #[arg(long)]
    force_overwrite: bool,

    /// Suppress the summary line.
    #[arg(long)]
    silent: bool,

    /// Compress the embedded string table.
    #[arg(long)]
    size_optimized: bool,

    /// Sort property groups by key for faster scans.
    #[arg(long)]
    read_optimized: bool,

    /// Skip baking the string-id index.
    #[arg(long)]
    no_string_id_index: bool,

    /// String-table compressor. Only effective with --size-optimized.
    #[arg(long)]
    compressor: Option<String>,

    /// Dictionary implementation used during the build.
    #[arg(long, value_enum, default_value = "sync")]
    dic_type: DicType,

    /// Shard count of the async dictionary.
    #[arg(long, default_value_t = 8)]
    dic_nthreads: usize,
}

#[derive(Args)]
struct ArchiveArgs {
    /// Path of the archive.
    archive: PathBuf,
}

#[derive(Args)]
struct ListArgs {
    /// What to enumerate (`compressors`).
    what: String,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum DicType {
    Sync,
    Async,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::CheckJs(args) => check_js(&args),
        Commands::Convert(args) => convert(&args),
        Commands::ViewCab(args) => view_cab(&args),
        Commands::Inspect(args) => inspect(&args),
        Commands::CabToJs(args) => cab_to_js(&args),
        Commands::List(args) => list(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn check_js(args: &CheckJsArgs) -> Result<(), String> {
    for path in &args.files {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        serde_json::from_str::<serde_json::Value>(&text)
            .map_err(|e| format!("{}: invalid JSON: {}", path.display(), e))?;
        println!("{}: ok", path.display());
    }
    Ok(())
}

fn convert(args: &ConvertArgs) -> Result<(), String> {
    if args.output.exists() && !args.force_overwrite {
        return Err(format!(
            "output file {} already exists; remove it first, or use --force-overwrite",
            args.output.display()
        ));
    }

    let requested = match args.compressor.as_deref() {
        Some(name) => Some(
            pack::by_name(name).ok_or_else(|| format!("unknown compressor '{}'", name))?,
        ),
        None => None,
    };
    let packer = if args.size_optimized {
        requested.unwrap_or(PackerType::Huffman)
    } else {
        if requested.is_some() && !args.silent {
            eprintln!("note: --compressor has no effect without --size-optimized");
        }
        PackerType::None
    };

    let text = fs::read_to_string(&args.input)
        .map_err(|e| format!("cannot read {}: {}", args.input.display(), e))?;

    let options = ArchiveOptions {
        packer,
        read_optimized: args.read_optimized,
        bake_sid_index: !args.no_string_id_index,
        dictionary: match args.dic_type {
            DicType::Sync => DictionaryKind::Sync,
            DicType::Async => DictionaryKind::Sharded,
        },
        num_shards: args.dic_nthreads,
    };

    let image = ser::archive_from_json(&text, &options).map_err(|e| e.to_string())?;
    ser::write_archive(&args.output, &image).map_err(|e| e.to_string())?;

    if !args.silent {
        println!(
            "{} -> {} ({} bytes)",
            args.input.display(),
            args.output.display(),
            image.len()
        );
    }
    Ok(())
}

fn view_cab(args: &ArchiveArgs) -> Result<(), String> {
    let archive = Archive::open(&args.archive).map_err(|e| e.to_string())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    archive.dump(&mut out).map_err(|e| e.to_string())?;
    out.flush().map_err(|e| e.to_string())?;
    Ok(())
}

fn inspect(args: &ArchiveArgs) -> Result<(), String> {
    let archive = Archive::open(&args.archive).map_err(|e| e.to_string())?;
    let info = archive.info();
    let rendered = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

fn cab_to_js(args: &ArchiveArgs) -> Result<(), String> {
    let archive = Archive::open(&args.archive).map_err(|e| e.to_string())?;
    let value = archive.to_json().map_err(|e| e.to_string())?;
    let rendered = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

fn list(args: &ListArgs) -> Result<(), String> {
    match args.what.as_str() {
        "compressors" => {
            for entry in STRATEGY_REGISTER.iter() {
                println!("{}", entry.name);
            }
            Ok(())
        }
        other => Err(format!("nothing to list for '{}'", other)),
    }
}

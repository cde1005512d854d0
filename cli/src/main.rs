use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use schema_deref_core::{dereference, CircularPolicy, DerefOptions, FsLoader, SiblingPolicy};
use serde_json::Value;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "schema-deref")]
#[command(about = "Replace $ref pointers in JSON Schema files with the content they point to")]
#[command(version)]
struct Cli {
    /// Input schema file, or a directory to process recursively
    input: PathBuf,

    /// Output file (single-file input only; defaults to stdout)
    #[arg(short, long, conflicts_with = "in_place")]
    output: Option<PathBuf>,

    /// Rewrite each input file with its dereferenced form
    #[arg(long)]
    in_place: bool,

    /// File extension to process when walking a directory
    #[arg(long, default_value = "json")]
    ext: String,

    /// Maximum reference-hop depth
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Cycle handling
    #[arg(long, value_enum, default_value_t = CircularArg::Preserve)]
    circular: CircularArg,

    /// Handling of keys alongside $ref
    #[arg(long, value_enum, default_value_t = SiblingsArg::Ignore)]
    siblings: SiblingsArg,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CircularArg {
    Preserve,
    Error,
}

impl From<CircularArg> for CircularPolicy {
    fn from(val: CircularArg) -> Self {
        match val {
            CircularArg::Preserve => CircularPolicy::Preserve,
            CircularArg::Error => CircularPolicy::Error,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum SiblingsArg {
    Ignore,
    Merge,
}

impl From<SiblingsArg> for SiblingPolicy {
    fn from(val: SiblingsArg) -> Self {
        match val {
            SiblingsArg::Ignore => SiblingPolicy::Ignore,
            SiblingsArg::Merge => SiblingPolicy::Merge,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    let options = DerefOptions {
        max_depth: cli.max_depth,
        circular: cli.circular.into(),
        siblings: cli.siblings.into(),
    };

    if cli.input.is_dir() {
        if cli.output.is_some() {
            bail!("--output cannot be used with a directory input; use --in-place");
        }
        if !cli.in_place {
            bail!("directory input requires --in-place");
        }
        return process_directory(&cli.input, &cli.ext, &options, cli.format);
    }

    let document = dereference_file(&cli.input, &options)?;
    if cli.in_place {
        write_json(&document, Some(&cli.input), cli.format)?;
        eprintln!("{} successful.", cli.input.display());
    } else {
        write_json(&document, cli.output.as_ref(), cli.format)?;
    }

    Ok(())
}

/// Dereference every matching file under `root` in place, reporting per-file
/// failures and continuing to the next file.
fn process_directory(
    root: &Path,
    ext: &str,
    options: &DerefOptions,
    format: OutputFormat,
) -> Result<()> {
    let mut total = 0usize;
    let mut failed = 0usize;

    for path in schema_files(root, ext) {
        total += 1;
        match dereference_file(&path, options)
            .and_then(|document| write_json(&document, Some(&path), format))
        {
            Ok(()) => eprintln!("{} successful.", path.display()),
            Err(err) => {
                failed += 1;
                eprintln!("Error {}: {err:#}", path.display());
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {total} files failed");
    }
    eprintln!("All {total} files processed successfully.");
    Ok(())
}

/// Load one schema file and dereference it against its own canonical
/// identifier, so relative references resolve next to the file.
fn dereference_file(path: &Path, options: &DerefOptions) -> Result<Value> {
    let id = FsLoader::document_id(path)
        .with_context(|| format!("Failed to resolve input file: {}", path.display()))?;
    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let schema: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse schema from: {}", path.display()))?;

    let result = dereference(&schema, &id, &FsLoader, options)
        .map_err(|e| anyhow::Error::from(e).context("Dereference failed"))?;

    if !result.circular_refs.is_empty() {
        eprintln!(
            "Warning: {} circular reference(s) preserved in {}",
            result.circular_refs.len(),
            path.display()
        );
    }

    Ok(result.document)
}

/// Lazy recursive walk yielding files with the given extension, directories
/// and files each visited in sorted order. Unreadable directories are
/// reported and skipped.
fn schema_files(root: &Path, ext: &str) -> SchemaFiles {
    SchemaFiles {
        pending_dirs: vec![root.to_path_buf()],
        pending_files: Vec::new(),
        ext: OsString::from(ext),
    }
}

struct SchemaFiles {
    pending_dirs: Vec<PathBuf>,
    pending_files: Vec<PathBuf>,
    ext: OsString,
}

impl Iterator for SchemaFiles {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            if let Some(file) = self.pending_files.pop() {
                return Some(file);
            }
            let dir = self.pending_dirs.pop()?;
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    eprintln!("Error reading {}: {err}", dir.display());
                    continue;
                }
            };

            let mut dirs = Vec::new();
            let mut files = Vec::new();
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        eprintln!("Error reading {}: {err}", dir.display());
                        continue;
                    }
                };
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                } else if path.extension() == Some(self.ext.as_os_str()) {
                    files.push(path);
                }
            }
            // Reverse-sorted so popping yields ascending order.
            dirs.sort_by(|a, b| b.cmp(a));
            files.sort_by(|a, b| b.cmp(a));
            self.pending_dirs.extend(dirs);
            self.pending_files.extend(files);
        }
    }
}

fn write_json(val: &Value, path: Option<&PathBuf>, format: OutputFormat) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }

    // Ensure trailing newline
    writeln!(writer).context("Failed to write trailing newline")?;

    Ok(())
}

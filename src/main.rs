use clap::{Args, Parser, Subcommand};
use sar::archive::{SarArchive, SarWriter};
use sar::{PackOptions, UnpackOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "sar", about = "NScripter SAR archive tool", version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FormatArgs {
    /// Archive layout: sar (count/data-start header, default) or bare
    #[arg(long)]
    layout: Option<String>,
    /// Name encoding: shift_jis (default) or utf-8
    #[arg(long)]
    encoding: Option<String>,
    /// Extra KEY=VALUE options passed to the format layer
    #[arg(long = "set", value_parser = parse_key_value)]
    set: Vec<(String, String)>,
}

#[derive(Args, Clone)]
struct BoundaryArgs {
    /// Entry count of a bare table
    #[arg(long, conflicts_with = "data_start")]
    count: Option<usize>,
    /// Absolute data region start of a bare table
    #[arg(long)]
    data_start: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack files and directories into an archive
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        format: FormatArgs,
        /// Files or directories; directories are walked in name order
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Unpack every entry into a directory
    Unpack {
        input: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        format: FormatArgs,
        #[command(flatten)]
        boundary: BoundaryArgs,
    },
    /// List archive contents
    List {
        input: PathBuf,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        format: FormatArgs,
        #[command(flatten)]
        boundary: BoundaryArgs,
    },
    /// Extract a single entry
    Extract {
        input: PathBuf,
        /// Entry name as shown by `list`
        name: String,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        format: FormatArgs,
        #[command(flatten)]
        boundary: BoundaryArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "warn,sar=debug" } else { "warn,sar=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();

    match cli.command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, format, input } => {
            let opts = PackOptions::from_map(&format.to_map())?;
            let mut ar = SarWriter::create(&output, opts)?;
            let previous = std::fs::canonicalize(&output).ok();
            for path in &input {
                for (root, relative) in gather_inputs(path, previous.as_deref())? {
                    ar.add_path(&root, &relative)?;
                    println!("  packed  {}", root.join(&relative).display());
                }
            }
            let summary = ar.finalize()?;
            println!("Created: {} ({} entries, {} bytes)",
                     output.display(), summary.entry_count, summary.total_len);
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir, format, boundary } => {
            let mut ar = open_archive(&input, &format, &boundary)?;
            let count = ar.extract_all(&output_dir)?;
            println!("Unpacked {} entries to: {}", count, output_dir.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json, format, boundary } => {
            let ar = open_archive(&input, &format, &boundary)?;
            let files = ar.list();
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                println!("Archive: {}  (data region at {})", input.display(), ar.table().data_region_start());
                println!("{:<40} {:>12} {:>12}", "Name", "Size", "Offset");
                for info in files {
                    println!("{:<40} {:>12} {:>12}", info.name, info.data_size, info.absolute_offset);
                }
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, name, output, format, boundary } => {
            let mut ar = open_archive(&input, &format, &boundary)?;
            let index = ar.list()
                .into_iter()
                .find(|info| info.name == name)
                .map(|info| info.index)
                .ok_or_else(|| sar::SarError::EntryNotFound(name.clone()))?;
            let size = ar.extract(index, &output)?;
            println!("Extracted {} ({} bytes) → {}", name, size, output.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

impl FormatArgs {
    /// Defaults, then `--set` pairs, then the dedicated flags.
    fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::from([
            ("layout".to_owned(), "sar".to_owned()),
            ("encoding".to_owned(), "shift_jis".to_owned()),
        ]);
        map.extend(self.set.iter().cloned());
        if let Some(layout) = &self.layout {
            map.insert("layout".into(), layout.clone());
        }
        if let Some(encoding) = &self.encoding {
            map.insert("encoding".into(), encoding.clone());
        }
        map
    }
}

fn open_archive(path: &Path, format: &FormatArgs, boundary: &BoundaryArgs) -> sar::Result<SarArchive> {
    let mut map = format.to_map();
    if let Some(count) = boundary.count {
        map.insert("count".into(), count.to_string());
    }
    if let Some(start) = boundary.data_start {
        map.insert("data_start".into(), start.to_string());
    }
    SarArchive::open(path, &UnpackOptions::from_map(&map)?)
}

/// `(root, relative)` pairs for one CLI input.  A plain file is named by its
/// file name; a directory contributes every file below it, sorted by path.
/// `skip` (an earlier copy of the archive being written) is never included.
fn gather_inputs(
    path: &Path,
    skip: Option<&Path>,
) -> Result<Vec<(PathBuf, PathBuf)>, Box<dyn std::error::Error>> {
    let is_skipped = |p: &Path| skip.is_some() && std::fs::canonicalize(p).ok().as_deref() == skip;

    if !path.is_dir() {
        if is_skipped(path) {
            tracing::warn!(path = %path.display(), "skipping the output archive");
            return Ok(Vec::new());
        }
        let name = path.file_name().ok_or_else(|| format!("not a file: {}", path.display()))?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok(vec![(root, PathBuf::from(name))]);
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            if is_skipped(entry.path()) {
                tracing::warn!(path = %entry.path().display(), "skipping the output archive");
                continue;
            }
            let relative = entry.path().strip_prefix(path)?.to_path_buf();
            found.push((path.to_path_buf(), relative));
        }
    }
    Ok(found)
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

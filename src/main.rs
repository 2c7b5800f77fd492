use clap::Parser;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::OnceLock;

/// A tool to find and remove the redundant "name (1).ext" copies that sync
/// and download tools leave next to an existing file of the same name.
/// By default the tool runs in read‑only mode.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directories to process
    #[arg(required = true)]
    dirs: Vec<PathBuf>,

    /// Process subdirectories recursively
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Perform file removal, otherwise just prints duplicate filenames
    #[arg(short = 'x', long)]
    execute: bool,

    /// Print progress diagnostics while scanning and removing
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Scan behaviour, passed explicitly into every call rather than held in
/// global option state.
#[derive(Clone, Copy, Debug)]
struct Config {
    recursive: bool,
    verbose: bool,
}

/// Memoized result of probing a canonical path: whether a regular file
/// exists there and, if so, how large it is.
#[derive(Clone, Copy, Debug)]
struct CachedInfo {
    is_file: bool,
    size: u64,
}

/// A suffixed file judged safe to delete, with its size for reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Candidate {
    path: PathBuf,
    size: u64,
}

fn copy_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<name>\S+)\s*\(\d+\)\.(?P<ext>.+)")
            .expect("copy suffix pattern must compile")
    })
}

/// Returns the canonical filename implied by a `name (1).ext` copy, or
/// `None` if the filename does not have the copy shape.
///
/// The name capture is a single non-whitespace run, so base names that
/// contain a literal space before the numeric suffix are never matched.
/// The match is anchored at the start only; the extension capture runs to
/// the end of the string and may itself contain dots.
fn canonical_name(file_name: &str) -> Option<String> {
    let caps = copy_suffix_pattern().captures(file_name)?;
    Some(format!("{}.{}", &caps["name"], &caps["ext"]))
}

/// Converts a file size in bytes to a human‐readable string with appropriate units.
fn human_readable(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn ansi_fixed(code: u8, text: impl AsRef<str>) -> String {
    format!("\x1b[38;5;{}m{}\x1b[0m", code, text.as_ref())
}

fn ansi_rgb(r: u8, g: u8, b: u8, text: impl AsRef<str>) -> String {
    format!("\x1b[38;2;{};{};{}m{}\x1b[0m", r, g, b, text.as_ref())
}

/// Probes a canonical path with a single metadata query. `NotFound` is a
/// normal outcome (the suffixed file is coincidentally named); any other
/// failure propagates.
fn probe_canonical(path: &Path) -> io::Result<CachedInfo> {
    match fs::metadata(path) {
        Ok(meta) => Ok(CachedInfo {
            is_file: meta.is_file(),
            size: meta.len(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(CachedInfo {
            is_file: false,
            size: 0,
        }),
        Err(err) => Err(err),
    }
}

/// Scans one directory for suffixed copies whose canonical file exists and
/// matches in size, recursing into subdirectories when enabled.
///
/// The canonical lookup cache lives exactly as long as this call: sibling
/// suffixed variants of the same base name ("(1)", "(2)", "(3)") share one
/// filesystem probe, and nothing leaks into sibling or parent scans.
/// Entry classification uses `DirEntry::file_type`, which does not follow
/// symlinks, so symlinked directories are never descended.
fn scan_dir(dir: &Path, config: &Config) -> io::Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    let mut cached_basefiles: HashMap<PathBuf, CachedInfo> = HashMap::new();

    if config.verbose {
        println!(
            "{}",
            ansi_fixed(8, format!("Scanning directory: {}", dir.display()))
        );
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() {
            let file_name = entry.file_name();
            // Non-UTF-8 names cannot match the copy pattern.
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(base_name) = canonical_name(name) else {
                continue;
            };
            let base_path = dir.join(base_name);
            if !cached_basefiles.contains_key(&base_path) {
                let info = probe_canonical(&base_path)?;
                cached_basefiles.insert(base_path.clone(), info);
            }
            let info = cached_basefiles[&base_path];
            if info.is_file {
                let size = entry.metadata()?.len();
                if info.size == size {
                    if config.verbose {
                        println!(
                            "{}",
                            ansi_fixed(
                                8,
                                format!(
                                    "Duplicate of {}: {}",
                                    base_path.display(),
                                    entry.path().display()
                                )
                            )
                        );
                    }
                    candidates.push(Candidate {
                        path: entry.path(),
                        size,
                    });
                }
            }
        } else if file_type.is_dir() && config.recursive {
            candidates.extend(scan_dir(&entry.path(), config)?);
        }
    }

    Ok(candidates)
}

/// Deletes every candidate in list order. The first failure aborts the
/// remaining batch; files already removed stay removed.
fn remove_files(candidates: &[Candidate], config: &Config) -> io::Result<u64> {
    let mut reclaimed = 0u64;
    for candidate in candidates {
        if config.verbose {
            println!("Removing {}", candidate.path.display());
        }
        fs::remove_file(&candidate.path)?;
        reclaimed += candidate.size;
    }
    Ok(reclaimed)
}

#[derive(Debug)]
enum AppError {
    Io(io::Error),
    MissingDirectory(PathBuf),
    NotADirectory(PathBuf),
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err)
    }
}

/// Validates a directory argument before it is scanned. A missing or
/// non-directory argument is fatal for the whole run.
fn ensure_directory(dir: &Path) -> Result<(), AppError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(AppError::NotADirectory(dir.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(AppError::MissingDirectory(dir.to_path_buf()))
        }
        Err(err) => Err(AppError::Io(err)),
    }
}

fn run_app(args: Args) -> Result<(), AppError> {
    let config = Config {
        recursive: args.recursive,
        verbose: args.verbose,
    };

    let mut total_found = 0usize;
    let mut total_bytes = 0u64;

    for dir in &args.dirs {
        ensure_directory(dir)?;
        let candidates = scan_dir(dir, &config)?;
        let reclaimable: u64 = candidates.iter().map(|c| c.size).sum();
        total_found += candidates.len();
        total_bytes += reclaimable;

        if args.execute {
            let reclaimed = remove_files(&candidates, &config)?;
            println!(
                "{} {}",
                ansi_rgb(173, 216, 230, format!("{}:", dir.display())),
                ansi_rgb(
                    255,
                    255,
                    224,
                    format!(
                        "removed {} duplicate copies ({} reclaimed).",
                        candidates.len(),
                        human_readable(reclaimed)
                    )
                )
            );
        } else {
            for candidate in &candidates {
                println!("{}", candidate.path.display());
            }
            println!(
                "{} {}",
                ansi_rgb(173, 216, 230, format!("{}:", dir.display())),
                ansi_rgb(
                    255,
                    255,
                    224,
                    format!(
                        "{} duplicate copies found ({} reclaimable). Re-run with --execute to remove them.",
                        candidates.len(),
                        human_readable(reclaimable)
                    )
                )
            );
        }
    }

    if args.dirs.len() > 1 {
        println!(
            "{} {}",
            ansi_rgb(173, 216, 230, "Total:"),
            ansi_rgb(
                255,
                255,
                224,
                format!(
                    "{} duplicate copies across {} directories ({}).",
                    total_found,
                    args.dirs.len(),
                    human_readable(total_bytes)
                )
            )
        );
    }

    Ok(())
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    match run_app(args) {
        Ok(()) => Ok(()),
        Err(AppError::Io(err)) => Err(err),
        Err(AppError::MissingDirectory(path)) => {
            eprintln!("Directory does not exist: {}", path.display());
            process::exit(1);
        }
        Err(AppError::NotADirectory(path)) => {
            eprintln!("Not a directory: {}", path.display());
            process::exit(1);
        }
    }
}

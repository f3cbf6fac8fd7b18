//! Main entry point for the zipcodec CLI application.
//!
//! This binary lists, extracts and creates ZIP archives. Writing extracted
//! entries to disk (directory creation, overwrite policy) lives here; the
//! library only hands back bytes.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zipcodec::{Cli, CompressionLevel, WriteOptions, ZipArchive, ZipFileEntry};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to create, list or
/// extract mode.
fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    if cli.create {
        return create_zip(&cli);
    }

    let archive = ZipArchive::open(&cli.file, cli.password.as_deref())
        .with_context(|| format!("cannot open {}", cli.file))?;
    process_zip(&archive, &cli)
}

/// Create an archive from the files and directories named on the command line.
fn create_zip(cli: &Cli) -> Result<()> {
    if cli.files.is_empty() {
        bail!("nothing to add: give at least one file or directory after {}", cli.file);
    }

    let level = CompressionLevel::try_from(cli.level)?;
    let mut options = WriteOptions::new().level(level).require_entries(true);
    if let Some(ref password) = cli.password {
        options = options.password(password.as_str());
    }
    if let Some(ref comment) = cli.comment {
        options = options.comment(comment.as_str());
    }

    let mut archive = ZipArchive::create(&cli.file, options, cli.overwrite)
        .with_context(|| format!("cannot create {} (use -o to overwrite)", cli.file))?;

    for input in &cli.files {
        if !cli.is_quiet() {
            println!("  adding: {}", input);
        }
        archive
            .zip_file_path(input, level)
            .with_context(|| format!("cannot add {}", input))?;
    }

    let summary = archive.close()?;
    if let Some(summary) = summary {
        if !cli.is_quiet() {
            println!(
                "{} entries, {} written",
                summary.entries_written,
                format_size(summary.bytes_written)
            );
        }
    }

    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// This function handles both listing and extraction modes:
/// - List mode (`-l` or `-v`): Display archive contents
/// - Extract mode: Extract files matching the specified filters
fn process_zip(archive: &ZipArchive, cli: &Cli) -> Result<()> {
    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        return list_files(archive, cli.verbose);
    }

    let entries = archive.entries()?;

    // Apply filters to determine which files to extract:
    // 1. Skip directories (they are created automatically during extraction)
    // 2. If specific files are requested, only include matching entries
    // 3. Exclude files matching the exclusion patterns
    let files_to_extract: Vec<(usize, &ZipFileEntry)> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            // Skip directory entries
            if e.is_directory {
                return false;
            }

            // If specific files are requested via positional arguments,
            // only include entries that match
            if !cli.files.is_empty() {
                let matches = cli.files.iter().any(|f| {
                    if has_glob_chars(f) {
                        // Pattern contains wildcards: use glob matching
                        glob_match(f, &e.file_name)
                    } else {
                        // No wildcards: exact match on filename or full path
                        e.file_name == *f || e.name() == f.as_str()
                    }
                });
                if !matches {
                    return false;
                }
            }

            // Exclude files matching the -x patterns
            if cli
                .exclude
                .iter()
                .any(|x| e.file_name.contains(x) || glob_match(x, &e.file_name))
            {
                return false;
            }

            true
        })
        .collect();

    if !cli.is_quiet() {
        if let Ok(comment) = archive.comment() {
            if !comment.is_empty() {
                println!("{}", comment);
            }
        }
    }

    // Extract each matching file
    let multiple_files = cli.pipe && files_to_extract.len() > 1;
    for (index, entry) in files_to_extract {
        extract_file(archive, index, entry, cli, multiple_files)?;
    }

    Ok(())
}

/// List files in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio, and timestamps
fn list_files(archive: &ZipArchive, verbose: bool) -> Result<()> {
    let entries = archive.entries()?;

    if verbose {
        // Print table header for verbose output
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let display_name = if entry.is_directory {
            format!("{}/", entry.file_name)
        } else {
            entry.file_name.clone()
        };

        if verbose {
            // Parse DOS timestamp into human-readable format
            let (year, month, day) = entry.mod_date();
            let (hour, minute, _second) = entry.mod_time();
            let lock = if entry.is_encrypted() { "*" } else { "" };

            // Print detailed entry information
            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}{}",
                entry.uncompressed_size,
                entry.compressed_size,
                ratio(entry.compressed_size, entry.uncompressed_size),
                year,
                month,
                day,
                hour,
                minute,
                display_name,
                lock
            );

            // Accumulate totals (excluding directories)
            if !entry.is_directory {
                total_uncompressed += entry.uncompressed_size;
                total_compressed += entry.compressed_size;
                file_count += 1;
            }
        } else {
            // Simple format: just the file name
            println!("{}", display_name);
        }
    }

    // Print summary line in verbose mode
    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100u64.saturating_sub(compressed * 100 / uncompressed)
        )
    } else {
        "  0%".to_string()
    }
}

/// Extract a single file from the archive.
///
/// Handles various extraction options:
/// - Pipe mode (`-p`): Write to stdout instead of file
/// - Custom output directory (`-d`): Extract to specified directory
/// - Junk paths (`-j`): Ignore directory structure in archive
/// - Overwrite control (`-n`, `-o`): Handle existing files
fn extract_file(
    archive: &ZipArchive,
    index: usize,
    entry: &ZipFileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    // Pipe mode: write file contents directly to stdout
    if cli.pipe {
        let unzipped = archive.unzip_file_at_index(index)?;
        let mut stdout = std::io::stdout().lock();
        if show_filename {
            stdout.write_all(format!("--- {} ---\n", entry.file_name).as_bytes())?;
        }
        stdout.write_all(unzipped.data.as_deref().unwrap_or_default())?;
        return Ok(());
    }

    // Determine the output path based on CLI options
    let file_name = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory structure
        entry.name().to_string()
    } else {
        // Preserve directory structure from archive
        entry.file_name.clone()
    };
    let output_path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    };

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            // -n flag: never overwrite, skip silently (unless quiet)
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.file_name);
            }
            return Ok(());
        }

        if !cli.overwrite {
            // Default behavior: skip with suggestion to use -o
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name);
            }
            return Ok(());
        }
        // -o flag: overwrite without prompting (fall through to extraction)
    }

    // Display extraction progress
    if !cli.is_very_quiet() && !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }

    // Perform the actual extraction
    let unzipped = archive
        .unzip_file_at_index(index)
        .with_context(|| format!("cannot extract {}", entry.file_name))?;
    write_output(&output_path, unzipped.data.as_deref().unwrap_or_default())
}

/// Write extracted bytes, creating parent directories if needed.
fn write_output(output_path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(output_path, data)?;
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// This is a basic implementation for file matching:
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// # Examples
///
/// ```ignore
/// assert!(glob_match("*.txt", "readme.txt"));
/// assert!(glob_match("file?.dat", "file1.dat"));
/// assert!(!glob_match("*.txt", "readme.md"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    /// Recursive helper function for glob matching.
    ///
    /// Uses a simple backtracking algorithm to handle `*` wildcards.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            // Both exhausted: match successful
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            // Question mark matches exactly one character
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            // Literal character match
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            // No match
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(glob_match("docs/*", "docs/a/b.md"));
        assert!(!glob_match("*.txt", "readme.md"));
    }

    #[test]
    fn test_ratio_never_underflows() {
        assert_eq!(ratio(50, 100), "  50%");
        assert_eq!(ratio(130, 100), "   0%");
        assert_eq!(ratio(0, 0), "  0%");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }
}

//! Main entry point for the zarch CLI application.
//!
//! Parses the command line, configures logging, and dispatches the command
//! to the [`Archiver`].

use anyhow::{Context, Result};
use clap::Parser;

use zarch::cli::USAGE;
use zarch::{Archiver, Cli, Command, ZipFileEntry};

/// Application entry point.
///
/// A malformed command prints the usage text and exits successfully; a
/// failed operation returns the error, which exits with status 1.
fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .format_timestamp(None)
        .init();

    let Some(command) = cli.command() else {
        println!("{USAGE}");
        return Ok(());
    };

    let archiver = Archiver::new(cli.options());
    run(&archiver, command, cli.quiet)
}

/// Execute one command.
///
/// # Arguments
///
/// * `archiver` - The configured archiver
/// * `command` - The parsed command
/// * `quiet` - Suppress progress lines
fn run(archiver: &Archiver, command: Command, quiet: bool) -> Result<()> {
    match command {
        Command::Compress {
            archive,
            comment,
            paths,
        } => {
            let report = archiver
                .add_files(&archive, &comment, &paths)
                .with_context(|| format!("Couldn't add files to {}", archive.display()))?;
            if !quiet {
                for (_, name) in &report.added {
                    println!("  adding: {name}");
                }
            }
        }
        Command::Uncompress {
            archive,
            destination,
        } => {
            let report = match destination {
                Some(destination) => archiver.extract(&archive, &destination),
                None => archiver.extract_default(&archive),
            }
            .with_context(|| format!("Couldn't extract {}", archive.display()))?;
            if !quiet {
                for path in &report.extracted {
                    println!("  extracting: {}", path.display());
                }
            }
        }
        Command::Comment { archive, comment } => {
            archiver
                .write_comment(&archive, &comment)
                .with_context(|| format!("Couldn't set the comment of {}", archive.display()))?;
        }
        Command::GetComment { archive } => {
            let comment = archiver
                .read_comment(&archive)
                .with_context(|| format!("Couldn't read the comment of {}", archive.display()))?;
            println!("{comment}");
        }
        Command::List { archive } => {
            let entries = archiver
                .list(&archive)
                .with_context(|| format!("Couldn't list {}", archive.display()))?;
            print_listing(&entries);
        }
    }

    Ok(())
}

/// Print a table with size, compression ratio, timestamp and name per entry,
/// followed by a totals line.
fn print_listing(entries: &[ZipFileEntry]) {
    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    // Track totals for summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

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

/// Space saved as a percentage, right-aligned to 5 columns.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "   0%".to_string()
    }
}

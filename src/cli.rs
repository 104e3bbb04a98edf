use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::archiver::ArchiverOptions;
use crate::zip::CompressionMethod;

/// Printed for any malformed command line.
pub const USAGE: &str = "Bad input, correct format: \n\
(Compress <Destination File> <Comment> <Files to compress>+)\n\
| (Uncompress <Source File> <Destination dir>?)\n\
| (Comment <Destination File> <Comment>)\n\
| (GetComment <Source File>)\n\
| (List <Source File>)\n\
All inputs must be without brackets!";

#[derive(Parser, Debug)]
#[command(name = "zarch")]
#[command(version)]
#[command(about = "Add files to, extract, and comment ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zarch compress docs.zip \"v1\" docs notes.txt   add docs/ and notes.txt to docs.zip\n  \
  zarch uncompress docs.zip                     extract into ./docs\n  \
  zarch comment docs.zip \"v2\"                   replace the archive comment\n  \
  zarch getcomment docs.zip                     print the archive comment")]
pub struct Cli {
    /// compress, uncompress, comment, getcomment or list (any case)
    #[arg(value_name = "COMMAND")]
    pub command: Option<String>,

    /// Arguments of the command
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Store new files without compression
    #[arg(long)]
    pub store: bool,

    /// Deflate level for new files
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub level: u32,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode: no progress lines, errors only
    #[arg(short = 'q')]
    pub quiet: bool,
}

/// A well-formed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Compress {
        archive: PathBuf,
        comment: String,
        paths: Vec<PathBuf>,
    },
    Uncompress {
        archive: PathBuf,
        destination: Option<PathBuf>,
    },
    Comment {
        archive: PathBuf,
        comment: String,
    },
    GetComment {
        archive: PathBuf,
    },
    List {
        archive: PathBuf,
    },
}

impl Cli {
    /// Interpret the verb and its arguments, or None if malformed.
    ///
    /// Extra trailing arguments to `uncompress`, `getcomment` and `list`
    /// are ignored.
    pub fn command(&self) -> Option<Command> {
        let verb = self.command.as_deref()?.to_lowercase();
        let args = self.args.as_slice();
        let archive = PathBuf::from(args.first()?);

        match verb.as_str() {
            "compress" if args.len() >= 3 => Some(Command::Compress {
                archive,
                comment: args[1].clone(),
                paths: args[2..].iter().map(PathBuf::from).collect(),
            }),
            "uncompress" => Some(Command::Uncompress {
                archive,
                destination: args.get(1).map(PathBuf::from),
            }),
            "comment" if args.len() == 2 => Some(Command::Comment {
                archive,
                comment: args[1].clone(),
            }),
            "getcomment" => Some(Command::GetComment { archive }),
            "list" => Some(Command::List { archive }),
            _ => None,
        }
    }

    pub fn options(&self) -> ArchiverOptions {
        let method = if self.store {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        };
        ArchiverOptions::new().method(method).level(self.level)
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipcodec")]
#[command(version)]
#[command(about = "Read and write ZIP archives, with traditional encryption", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipcodec data1.zip -x joe             extract all files except joe from data1.zip\n  \
  zipcodec -p foo.zip | more            send contents of foo.zip via pipe into more\n  \
  zipcodec -P secret -l locked.zip      list files of an encrypted archive\n  \
  zipcodec -c -L 9 out.zip src docs     create out.zip from src/ and docs/")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all), or inputs to add with -c
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Password for encrypted entries (extract) or for encrypting (create)
    #[arg(short = 'P', value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Create FILE from the given inputs instead of extracting
    #[arg(short = 'c')]
    pub create: bool,

    /// Compression level when creating: -1 (default), 0 (store) to 9 (smallest)
    #[arg(short = 'L', value_name = "LEVEL", default_value_t = -1, allow_negative_numbers = true)]
    pub level: i32,

    /// Archive comment when creating
    #[arg(short = 'z', value_name = "COMMENT")]
    pub comment: Option<String>,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> log::LevelFilter {
        match self.quiet {
            0 if self.verbose => log::LevelFilter::Info,
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Error,
            _ => log::LevelFilter::Off,
        }
    }
}

use clap::Parser;

use crate::config::IngestConfig;
use crate::line::{LineFilter, LogLevel};
use crate::select::ServiceSelector;

#[derive(Parser, Debug)]
#[command(name = "logbundle")]
#[command(version)]
#[command(about = "Read the logs inside a companion-computer log bundle", long_about = None)]
#[command(after_help = "Examples:\n  \
  logbundle logs.zip                   show the service with the newest log\n  \
  logbundle -l logs.zip                list services in the bundle\n  \
  logbundle -s kraken logs.zip         show every kraken log, newest first\n  \
  logbundle logs.zip -x '*camera*'     load everything except camera services\n  \
  logbundle logs.zip -a -L error warn  every error and warning, newest log first\n  \
  logbundle -v http://blueos.local/logs.zip   list logs from a vehicle")]
pub struct Cli {
    /// Log bundle path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Services to load, glob patterns allowed (default: all)
    #[arg(value_name = "SERVICES")]
    pub services: Vec<String>,

    /// List services
    #[arg(short = 'l')]
    pub list: bool,

    /// List every log with its timestamp and size
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Service to show (default: the one with the newest log)
    #[arg(short = 's', value_name = "SERVICE", conflicts_with = "all")]
    pub select: Option<String>,

    /// Show the logs of every service
    #[arg(short = 'a')]
    pub all: bool,

    /// Exclude services that follow
    #[arg(short = 'x', value_name = "SERVICE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Also read zip files nested inside the bundle
    #[arg(short = 'n')]
    pub nested: bool,

    /// Write shown logs to FILE instead of stdout
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<String>,

    /// Only show lines of these levels (error, warn, info, debug, trace, unknown)
    #[arg(short = 'L', value_name = "LEVEL", num_args = 1..)]
    pub levels: Vec<String>,

    /// Only show lines matching this case-insensitive regex
    #[arg(short = 'g', value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Number of logs decoded in parallel
    #[arg(short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn log_filter(&self) -> &'static str {
        if self.is_very_quiet() {
            "off"
        } else if self.is_quiet() {
            "logbundle=error"
        } else if self.verbose {
            "logbundle=info"
        } else {
            "logbundle=warn"
        }
    }

    /// Line filter for `-L`/`-g`; `None` shows whole logs
    pub fn line_filter(&self) -> Result<Option<LineFilter>, regex::Error> {
        if self.levels.is_empty() && self.grep.is_none() {
            return Ok(None);
        }

        let mut filter = LineFilter::new();
        if !self.levels.is_empty() {
            filter = filter.with_levels(
                self.levels
                    .iter()
                    .map(|level| LogLevel::parse(&level.to_ascii_uppercase())),
            );
        }
        if let Some(pattern) = &self.grep {
            filter = filter.with_pattern(pattern)?;
        }
        Ok(Some(filter))
    }

    pub fn ingest_config(&self) -> IngestConfig {
        let mut config = IngestConfig::default()
            .with_nested(self.nested)
            .with_services(ServiceSelector::new(
                self.services.clone(),
                self.exclude.clone(),
            ));
        if let Some(jobs) = self.jobs {
            config = config.with_workers(jobs);
        }
        config
    }
}

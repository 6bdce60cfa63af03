use std::env;
use std::time::Duration;

/// Mount point prefix of DataWarp burst-buffer allocations on Cray systems
pub const DEFAULT_TARGET_MOUNT: &str = "/var/opt/cray/dws/mounts/batch";
pub const DEFAULT_POOL_SIZE: usize = 4;

/// An external program plus the arguments placed before the trace path
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Same arguments, different executable
    fn with_program(mut self, program: String) -> Self {
        self.program = program;
        self
    }
}

/// Configuration for the scan pipeline and its external decoders
#[derive(Debug, Clone)]
pub struct Config {
    /// Mount paths starting with this prefix are counted
    pub target_mount_prefix: String,
    /// Number of parallel workers
    pub pool_size: usize,
    /// Per-job limit on decoder runtime; `None` waits forever
    pub job_timeout: Option<Duration>,
    /// Used for `.txt.gz` traces
    pub decompressor: ExternalCommand,
    /// Used for everything else
    pub parser: ExternalCommand,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_mount_prefix: env::var("DARSHAN_TARGET_MOUNT")
                .unwrap_or(defaults.target_mount_prefix),
            pool_size: env::var("DARSHAN_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.pool_size),
            job_timeout: env::var("DARSHAN_JOB_TIMEOUT")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
            decompressor: match env::var("DARSHAN_DECOMPRESSOR") {
                Ok(program) => defaults.decompressor.with_program(program),
                Err(_) => defaults.decompressor,
            },
            parser: match env::var("DARSHAN_PARSER") {
                Ok(program) => defaults.parser.with_program(program),
                Err(_) => defaults.parser,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_mount_prefix: DEFAULT_TARGET_MOUNT.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            job_timeout: None,
            decompressor: ExternalCommand::new("gunzip", ["-c"]),
            parser: ExternalCommand::new("darshan-parser", Vec::<String>::new()),
        }
    }
}

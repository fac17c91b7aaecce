use clap::{Parser, Subcommand};

/// Command-line interface definition for milltrack
/// Counter telemetry for milling machines: power state, daily production, batches
#[derive(Parser)]
#[command(
    name = "milltrack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Turn raw machine counters into daily production, power incidents and batch progress",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    /// Print reports as JSON instead of tables
    #[arg(global = true, long = "json")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Show or validate the configuration
    Config {
        #[arg(long = "print", help = "Print the current configuration")]
        print_config: bool,

        #[arg(long = "check", help = "Validate configuration values")]
        check: bool,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity")]
        check: bool,

        #[arg(long = "vacuum", help = "Optimize the database using VACUUM")]
        vacuum: bool,

        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },

    /// Print the internal audit log
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },

    /// Provision and configure devices
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },

    /// Store raw samples from a JSON-lines file
    Ingest {
        /// File with one sample object per line
        #[arg(long = "file")]
        file: String,

        /// Store samples without running the power monitor
        #[arg(long = "no-power")]
        no_power: bool,
    },

    /// Power state monitor
    Power {
        #[command(subcommand)]
        action: PowerAction,
    },

    /// Recompute daily production records
    Compute {
        /// Date to compute (YYYY-MM-DD)
        #[arg(long = "date")]
        date: String,

        /// Last date of a range starting at --date
        #[arg(long = "to")]
        to: Option<String>,

        /// Only this device (name or id); default is every device
        #[arg(long = "device")]
        device: Option<String>,
    },

    /// List production records of a device
    List {
        #[arg(long = "device")]
        device: String,

        /// YYYY, YYYY-MM, YYYY-MM-DD or start:end (default: current month)
        #[arg(long = "period")]
        period: Option<String>,
    },

    /// Record the outcome of a counter reset
    Reset {
        #[arg(long = "device")]
        device: String,

        /// When the reset happened (YYYY-MM-DD HH:MM:SS)
        #[arg(long = "at")]
        at: String,

        /// Counter value read just before the reset
        #[arg(long = "before")]
        before: i64,

        #[arg(long = "reason", default_value = "")]
        reason: String,

        /// The reset command did not succeed
        #[arg(long = "failed")]
        failed: bool,
    },

    /// Production batches
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },

    /// Find and repair days that absorbed a telemetry gap
    Correct {
        /// Flag days above this multiple of the trailing average
        #[arg(long = "threshold", default_value_t = 5.0)]
        threshold: f64,

        #[arg(long = "device")]
        device: Option<String>,

        /// Report what would change without writing
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum DeviceAction {
    /// Register a new device
    Add {
        name: String,

        #[arg(long = "factory", default_value_t = 0)]
        factory: i64,

        /// Counter slot carrying production (1..4)
        #[arg(long = "counter", default_value_t = 1)]
        counter: u8,

        /// legacy | reset_aware
        #[arg(long = "mode", default_value = "legacy")]
        mode: String,

        /// Power indicator values above this count as powered
        #[arg(long = "threshold", default_value_t = 0.0)]
        threshold: f64,
    },

    /// List devices
    List,

    /// Change mode, counter or threshold of a device
    Set {
        device: String,

        #[arg(long = "counter")]
        counter: Option<u8>,

        #[arg(long = "mode")]
        mode: Option<String>,

        #[arg(long = "threshold")]
        threshold: Option<f64>,
    },
}

#[derive(Subcommand)]
pub enum PowerAction {
    /// Feed every device its unprocessed samples
    Sweep,

    /// Show the power status of every device
    Status,

    /// List power events
    Events {
        #[arg(long = "device")]
        device: Option<String>,

        /// Only unresolved events
        #[arg(long = "open")]
        open: bool,
    },

    /// Mark an event as resolved
    Resolve { id: i64 },
}

#[derive(Subcommand)]
pub enum BatchAction {
    /// Create a batch
    Add {
        name: String,

        #[arg(long = "factory")]
        factory: i64,

        /// Batch start (YYYY-MM-DD HH:MM:SS or YYYY-MM-DD)
        #[arg(long = "start")]
        start: String,

        /// Expected output in tons
        #[arg(long = "expected")]
        expected: f64,

        /// Counter value at start, used until a sample exists
        #[arg(long = "start-value", default_value_t = 0)]
        start_value: i64,

        /// Share of output lost as waste (default from config)
        #[arg(long = "waste")]
        waste: Option<f64>,
    },

    /// List batches
    List,

    /// Recompute and show progress of one batch
    Progress { id: i64 },

    /// Recompute every open batch
    Sweep,

    /// Set the lifecycle status of a batch
    Status { id: i64, status: String },
}

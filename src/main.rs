use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tcmb_mcp::core::config::{AppConfig, Transport};
use tcmb_mcp::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum TransportArg {
    Stdio,
    Tcp,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached bulletins
    List,
    /// Remove every cached bulletin
    Clear,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Serve the rate tools over MCP
    Serve {
        /// Overrides the configured transport
        #[arg(short, long, value_enum)]
        transport: Option<TransportArg>,
    },
    /// Show exchange rates, today's unless a date is given
    Rates {
        /// YYYY-MM-DD, DD.MM.YYYY, today or yesterday
        #[arg(short, long)]
        date: Option<String>,
        /// Currency codes to show
        currencies: Vec<String>,
    },
    /// List published currencies
    Currencies,
    /// Convert an amount between currencies
    Convert {
        amount: Decimal,
        from: String,
        to: String,
        #[arg(short, long)]
        date: Option<String>,
        /// buying, selling or a full rate kind such as banknote_selling
        #[arg(short, long)]
        rate_type: Option<String>,
    },
    /// Show a currency's rates over a period with statistics
    History {
        currency: String,
        start: String,
        end: String,
        #[arg(short, long)]
        rate_type: Option<String>,
    },
    /// Compare currencies on a date or over a period
    Compare {
        #[arg(required = true)]
        currencies: Vec<String>,
        /// Compare on this single date
        #[arg(short, long, conflicts_with_all = ["start", "end"])]
        date: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Period length when no start date is given [default: 30]
        #[arg(long)]
        days: Option<i64>,
    },
    /// Inspect or clear the local rate cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

impl From<Commands> for tcmb_mcp::AppCommand {
    fn from(cmd: Commands) -> tcmb_mcp::AppCommand {
        use tcmb_mcp::AppCommand;
        match cmd {
            Commands::Serve { transport } => AppCommand::Serve {
                transport: transport.map(|t| match t {
                    TransportArg::Stdio => Transport::Stdio,
                    TransportArg::Tcp => Transport::Tcp,
                }),
            },
            Commands::Rates { date, currencies } => AppCommand::Rates { date, currencies },
            Commands::Currencies => AppCommand::Currencies,
            Commands::Convert {
                amount,
                from,
                to,
                date,
                rate_type,
            } => AppCommand::Convert {
                amount,
                from,
                to,
                date,
                rate_type,
            },
            Commands::History {
                currency,
                start,
                end,
                rate_type,
            } => AppCommand::History {
                currency,
                start,
                end,
                rate_type,
            },
            Commands::Compare {
                currencies,
                date,
                start,
                end,
                days,
            } => AppCommand::Compare {
                currencies,
                date,
                start,
                end,
                days,
            },
            Commands::Cache {
                command: CacheCommands::List,
            } => AppCommand::CacheList,
            Commands::Cache {
                command: CacheCommands::Clear,
            } => AppCommand::CacheClear,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config_path.as_deref())?;
    let serving = matches!(cli.command, Some(Commands::Serve { .. }));
    // Table output would drown in info lines, so other commands only log warnings.
    let level = config
        .log_level
        .as_deref()
        .or(if serving { None } else { Some("warn") });
    init_logging(cli.verbose || config.debug, level);

    let result = match cli.command {
        Some(Commands::Setup) => tcmb_mcp::cli::setup::setup(),
        Some(cmd) => tcmb_mcp::run_command(cmd.into(), &config).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

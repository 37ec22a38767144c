use clap::{Parser, Subcommand};
use log::debug;

mod commands;
mod utils;

/// rust-ndn command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Forwarder transport (unix://PATH, tcp://HOST:PORT, ws://URL)
    #[clap(
        short,
        long,
        global = true,
        default_value = "unix:///run/nfd/nfd.sock"
    )]
    transport: String,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the forwarder's face table
    Status,

    /// Send ping Interests and report round-trip times
    Ping {
        /// Name prefix to ping (NDN URI format)
        name: String,

        /// Number of Interests to send
        #[clap(short, long, default_value = "4")]
        count: usize,

        /// Interval between Interests in milliseconds
        #[clap(short, long, default_value = "1000")]
        interval: u64,

        /// Interest lifetime in milliseconds
        #[clap(long, default_value = "4000")]
        lifetime: u64,
    },

    /// Manage forwarder links
    Link {
        #[clap(subcommand)]
        cmd: commands::link::LinkCommands,
    },

    /// Generate a signing key
    Keygen {
        /// Key name (NDN URI format)
        name: String,
    },

    /// Run the distance-vector routing daemon
    Dv {
        /// Network prefix shared by all routers
        #[clap(long)]
        network: String,

        /// This router's name
        #[clap(long)]
        router: String,

        /// Neighbor router names (repeatable)
        #[clap(long = "neighbor")]
        neighbors: Vec<String>,

        /// Prefixes to announce at startup (repeatable)
        #[clap(long = "announce")]
        announcements: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
    debug!("transport: {}", cli.transport);

    let result = match cli.command {
        Commands::Status => commands::status::run(&cli.transport).await,
        Commands::Ping {
            name,
            count,
            interval,
            lifetime,
        } => commands::ping::run(&cli.transport, &name, count, interval, lifetime).await,
        Commands::Link { cmd } => commands::link::run(&cli.transport, cmd).await,
        Commands::Keygen { name } => commands::keygen::run(&name),
        Commands::Dv {
            network,
            router,
            neighbors,
            announcements,
        } => commands::dv::run(&cli.transport, network, router, neighbors, announcements).await,
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            eprintln!("ndn-rs: {e}");
            std::process::exit(utils::exit_code(&e));
        }
    }
}

use std::path::PathBuf;
use structopt::StructOpt;

use warden::config::Config;
use warden::output::{OutputFormat, OutputHandler};
use warden::persistence::open_store;
use warden::{AuthLogParser, CommandFirewall, FileAuthLog, FirewallStateParser, Pipeline};

/// SSH brute-force detector and firewall enforcer
#[derive(StructOpt, Debug)]
#[structopt(name = "warden", about = "Ban addresses that brute-force sshd")]
pub enum Cli {
    /// Scan the auth log once and ban new offenders
    Run {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Log ban commands without executing them
        #[structopt(long)]
        dry_run: bool,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Parse and display failed logins from an auth log
    Parse {
        /// Path to log file
        #[structopt(short, long)]
        file: PathBuf,
        /// Number of events to show
        #[structopt(short = "n", long, default_value = "10")]
        lines: usize,
    },
    /// Parse a saved firewall dump and list dropped addresses
    Firewall {
        /// Path to an iptables-save dump
        #[structopt(short, long)]
        file: PathBuf,
        /// Prefix of the chain-introduction line
        #[structopt(long, default_value = ":OUTPUT ACCEPT")]
        chain_header: String,
        /// Token marking a drop rule
        #[structopt(long, default_value = " DROP")]
        drop_token: String,
    },
    /// Print the persisted blacklist
    Blacklist {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = execute(Cli::from_args()).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli {
        Cli::Run { config, dry_run } => {
            let mut config = load_config(&config)?;
            config.firewall.dry_run |= dry_run;
            run(&config).await?;
        }
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Parse { file, lines } => {
            let text = std::fs::read_to_string(&file)?;
            let events = AuthLogParser::new().parse(&text)?;
            let display_count = std::cmp::min(lines, events.len());

            println!("Parsed {} failed login(s) (showing {}):\n", events.len(), display_count);
            for event in events.iter().take(display_count) {
                println!(
                    "  {}  {:<15}  {}",
                    event.timestamp, event.source_address, event.username
                );
            }
        }
        Cli::Firewall {
            file,
            chain_header,
            drop_token,
        } => {
            let dump = std::fs::read_to_string(&file)?;
            let parser = FirewallStateParser::with_anchors(&chain_header, &drop_token);
            let entries = parser.parse(&dump)?;
            println!("{} dropped address(es):", entries.len());
            for entry in entries {
                println!("  {}", entry.address);
            }
        }
        Cli::Blacklist { config } => {
            let config = load_config(&config)?;
            let store = open_store(&config.persistence.backend, &config.persistence.path)?;
            let entries = store.load()?;
            println!("{} blacklisted address(es):", entries.len());
            for entry in entries {
                println!(
                    "  {:<15}  {:>5}  {}  {}",
                    entry.address,
                    entry.attempt_count,
                    entry.last_seen,
                    entry.users_display()
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    if path.exists() {
        Config::from_file(path)
    } else {
        log::warn!("Config file {:?} not found, using defaults", path);
        Ok(Config::default())
    }
}

async fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Starting warden run");

    let auth_log = FileAuthLog::new(config.input.auth_log_file.clone());
    let firewall = CommandFirewall::new(
        &config.input.firewall_state_command,
        &config.firewall.ban_command,
        &config.firewall.ip_placeholder,
    )
    .dry_run(config.firewall.dry_run);
    let store = open_store(&config.persistence.backend, &config.persistence.path)?;

    let report = Pipeline::new(config, &auth_log, &firewall, store.as_ref())
        .run()
        .await?;

    let mut output = OutputHandler::new(
        OutputFormat::from_str(&config.output.format),
        config.output.file_path.clone(),
    )?;
    output.write_report(&report)?;
    output.flush()?;

    log::info!("Done");
    Ok(())
}

use clap::{Parser, Subcommand};
use lightvpn::app::{App, user_message};
use lightvpn::console::{Console, TerminalConsole, render_server_table};
use lightvpn::launcher::OpenVpnLauncher;
use lightvpn::Config;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "lightvpn")]
#[command(about = "Command-line client for LightVPN")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, pick a server and connect (default)
    Connect {
        /// Re-download server configs even if cached
        #[arg(short, long)]
        refresh: bool,
    },
    /// List available servers
    Servers,
    /// Download server configs into the local cache
    Sync {
        /// Replace the cache even if it is populated
        #[arg(short, long)]
        force: bool,
    },
    /// Forget the saved session
    Logout,
    /// Show the client changelog
    Changelog,
    /// Download the latest updater
    Update,
    /// Download TAP drivers and OpenVPN binaries
    Drivers,
    /// Generate default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they don't interleave with the server table
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::discover()?;
    let paths = config.paths()?;

    let command = cli.command.unwrap_or(Commands::Connect { refresh: false });
    if let Commands::Init = command {
        info!("Generating default config...");
        std::fs::create_dir_all(&paths.settings_dir)?;
        let path = paths.config_file();
        Config::default().save(&path)?;
        println!("Created default config: {}", path.display());
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())?;

    let app = App::new(&config, &paths, TerminalConsole::new())?;
    app.console().banner();

    let result = match command {
        Commands::Connect { refresh } => {
            let launcher = OpenVpnLauncher::new(config.openvpn.binary.clone());
            app.connect(&launcher, refresh, &cancel).await
        }
        Commands::Servers => app.servers(&cancel).await.map(|servers| {
            app.console().print(&render_server_table(&servers));
        }),
        Commands::Sync { force } => app.sync_configs(force, &cancel).await,
        Commands::Logout => app.logout().await,
        Commands::Changelog => app
            .changelog(&cancel)
            .await
            .map(|text| app.console().print(&format!("{}\n", text))),
        Commands::Update => app
            .download_updater(&std::env::temp_dir(), &cancel)
            .await
            .map(|path| {
                app.console()
                    .success(&format!("Updater downloaded to {}", path.display()));
            }),
        Commands::Drivers => app.install_drivers(&cancel).await,
        Commands::Init => Ok(()),
    };

    if let Err(e) = result {
        error!("Command failed: {:?}", e);
        app.console().error(&user_message(&e));
        std::process::exit(1);
    }

    Ok(())
}

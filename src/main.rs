use clap::Parser;
use field_lines::config::AppConfig;
use field_lines::logging::init_tracing;
use field_lines::server;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Address to bind, overrides the configuration file
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides the configuration file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.server.debug |= cli.debug;
    config.validate()?;

    init_tracing(config.server.debug);
    info!(
        resolution = config.plot.resolution,
        density = config.plot.density,
        dpi = config.plot.dpi,
        "starting field-lines"
    );

    server::serve(config).await
}

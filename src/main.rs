use clap::Parser;
use rollcall::{app, cli, config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = cli::Args::parse();
    let config = config::Config::load()?;
    logging::setup(&config.log_level, args.log_format);

    app::run(config, args.port).await
}

use nrschedulemirror::error::Error;
use nrschedulemirror::manager::Manager;
use nrschedulemirror::mirror_manager::{MirrorConfig, MirrorManager};
use nrschedulemirror::schedule_manager::ScheduleManager;

use config_file::FromConfigFile;
use serde::Deserialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Deserialize)]
struct Config {
    mirror: MirrorConfig,
}

fn init_logger() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_logger();

    let config_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./config.toml".to_string());
    info!("Reading config from file {:?}", &config_file);
    let config = Config::from_config_file(&config_file)?;
    debug!("Launching with config : {:#?}", config);

    let schedule_manager = ScheduleManager::new();

    let mut mirror_manager = MirrorManager::new(config.mirror, &schedule_manager).await?;

    tokio::try_join!(mirror_manager.run(),)?;

    Ok(())
}

use crate::error::Error;
use crate::fetcher::Fetcher;
use crate::file_fetcher::FileFetcher;
use crate::manager::Manager;
use crate::schedule_data::{write_lines, Format};
use crate::schedule_manager::ScheduleManager;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::info;

#[derive(Clone, Debug, Deserialize)]
pub struct MirrorConfig {
    format: Format,
    full: String,
    #[serde(default)]
    updates: Vec<String>,
    #[serde(default)]
    output: Option<String>,
}

/// Loads a full extract and then each update in order, each inside its own
/// transaction, and optionally writes the result back out as one full CIF
/// extract.
pub struct MirrorManager<'a> {
    schedule_manager: &'a ScheduleManager,
    config: MirrorConfig,
}

impl MirrorManager<'_> {
    pub async fn new<'a>(
        config: MirrorConfig,
        schedule_manager: &'a ScheduleManager,
    ) -> Result<MirrorManager<'a>, Error> {
        Ok(MirrorManager {
            schedule_manager,
            config,
        })
    }

    async fn load<F: Fetcher + Sync>(&self, fetcher: &F) -> Result<(), Error> {
        let mut transaction = self.schedule_manager.transactional_write().await;

        let reader = fetcher.fetch().await?;
        transaction.load(reader, self.config.format).await?;

        transaction.commit();
        info!("Applied {}", fetcher.describe());
        Ok(())
    }

    async fn write(&self, output: &str) -> Result<(), Error> {
        let lines = {
            let data = self.schedule_manager.read();
            data.generate_cif()?
        };
        let mut writer = BufWriter::new(File::create(output).await?);
        write_lines(&lines, &mut writer).await?;
        info!("Wrote {} lines to {}", lines.len(), output);
        Ok(())
    }
}

#[async_trait]
impl Manager for MirrorManager<'_> {
    async fn run(&mut self) -> Result<(), Error> {
        self.load(&FileFetcher::new(&self.config.full)).await?;
        for update in &self.config.updates {
            self.load(&FileFetcher::new(update)).await?;
        }

        if let Some(output) = &self.config.output {
            self.write(output).await?;
        }

        Ok(())
    }
}

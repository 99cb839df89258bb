use crate::error::Error;

use async_trait::async_trait;

/// Drives loading into a `ScheduleManager`.
#[async_trait]
pub trait Manager {
    async fn run(&mut self) -> Result<(), Error>;
}

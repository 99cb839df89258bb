use crate::error::Error;

use async_trait::async_trait;

use tokio::io::AsyncBufRead;

/// Somewhere a single extract can be read from, line by line.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, Error>;

    /// Names the extract in log messages.
    fn describe(&self) -> String;
}

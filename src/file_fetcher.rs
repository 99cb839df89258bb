use crate::error::Error;
use crate::fetcher::Fetcher;

use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::info;

use std::path::PathBuf;

/// Reads an extract from a local file. Files ending in `.gz` are
/// decompressed on the fly, as Network Rail publishes them.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    fn is_gzip(&self) -> bool {
        self.path.extension().is_some_and(|x| x == "gz")
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, Error> {
        info!("Reading {}", self.describe());
        let file = File::open(&self.path).await?;
        if self.is_gzip() {
            let gz = GzipDecoder::new(BufReader::new(file));
            Ok(Box::new(BufReader::new(gz)))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

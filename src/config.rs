//! Runtime configuration shared by every stage.
//!
//! Values come from command-line flags, falling back to environment
//! variables (a `.env` file is loaded first by the binary), then defaults.

use std::path::PathBuf;

use clap::Args;

use crate::store::{FileStore, LocalFileStore, S3FileStore};

#[derive(Debug, Clone, Args)]
pub struct PipelineConfig {
    /// SQLite database holding staging and output tables
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://data/warehouse.db")]
    pub database_url: String,

    /// Directory containing the source CSV files
    #[arg(long, env = "INPUT_DIR", default_value = "data/input")]
    pub input_dir: PathBuf,

    /// Directory the aggregate CSV files are written to
    #[arg(long, env = "OUTPUT_DIR", default_value = "data/output")]
    pub output_dir: PathBuf,

    /// Optional: S3 bucket to mirror the aggregate files to
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix for the S3 mirror
    #[arg(long, env = "S3_PREFIX", default_value = "")]
    pub s3_prefix: String,

    /// Gzip files before uploading to S3
    #[arg(long, default_value_t = false)]
    pub gzip: bool,
}

impl PipelineConfig {
    /// Local-only configuration, no S3 mirror.
    pub fn local(
        database_url: impl Into<String>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            s3_bucket: None,
            s3_prefix: String::new(),
            gzip: false,
        }
    }

    pub fn input_file(&self, name: &str) -> PathBuf {
        self.input_dir.join(name)
    }

    /// The output directory, plus the S3 mirror when a bucket is set.
    pub async fn file_stores(&self) -> Vec<Box<dyn FileStore>> {
        let mut stores: Vec<Box<dyn FileStore>> =
            vec![Box::new(LocalFileStore::new(&self.output_dir))];

        if let Some(bucket) = self.s3_bucket.as_deref().filter(|b| !b.is_empty()) {
            stores.push(Box::new(
                S3FileStore::from_env(bucket, &self.s3_prefix, self.gzip).await,
            ));
        }

        stores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_config_has_single_store() {
        let config = PipelineConfig::local("sqlite://x.db", "in", "out");
        assert_eq!(config.file_stores().await.len(), 1);
        assert_eq!(
            config.input_file("dummy_routes.csv"),
            PathBuf::from("in/dummy_routes.csv")
        );
    }
}

use anyhow::Result;
use jobwatch::MonitorConfig;

use super::watch::{self, Begin};

pub async fn execute(config: &MonitorConfig) -> Result<()> {
    watch::run(config, Begin::Resume).await
}

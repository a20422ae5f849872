use super::load_config;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;

pub fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    for w in config.validate() {
        tracing::warn!(level = ?w.level, "{}", w.message);
    }

    let service = config
        .build_service()
        .context("failed to start report service")?;
    let addr = config.server.bind_addr();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(brsr_server::serve(Arc::new(service), &addr))
}

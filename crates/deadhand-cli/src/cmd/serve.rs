use super::Workspace;
use deadhand_core::config::WarnLevel;
use std::sync::Arc;

pub fn run(ws: &Workspace<'_>, port: Option<u16>) -> anyhow::Result<()> {
    let config = ws.config()?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }
    let engine = Arc::new(ws.engine()?);
    let port = port.unwrap_or(config.server.port);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!(
            "deadhand serving {} on http://localhost:{actual_port} (time unit: {})",
            ws.root.display(),
            config.time_unit
        );

        tokio::select! {
            res = deadhand_server::serve_on(engine, &config.scheduler, listener) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}

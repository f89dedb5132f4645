use docqa_server::{ServerConfig, run_server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    telemetry::init_tracing();

    run_server(config).await
}

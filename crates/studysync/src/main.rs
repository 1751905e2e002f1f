use studysync::{ServerConfig, StudySyncError, StudySyncServer};

#[tokio::main]
async fn main() -> Result<(), StudySyncError> {
    studysync::init_tracing();

    let config = ServerConfig::from_env();
    tracing::info!(bind = %config.bind_addr, idle_timeout = ?config.idle_timeout, "starting");

    let server = StudySyncServer::builder().config(config).build().await?;
    server.run().await
}

use thumbnailer_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = thumbnailer_api::setup::initialize_app(config.clone()).await?;

    thumbnailer_api::setup::server::start_server(&config, router).await?;

    if let Some(queue) = &state.trigger_queue {
        queue.shutdown().await;
    }

    Ok(())
}

mod host;
mod request;

use std::{sync::Arc, time::Duration};

use {
    anyhow::{Context, Result},
    naia_chat::ChatDelegate,
    naia_gateway::{ConnectOptions, GatewayClient, JsonLinesSink, OutputSink, forward_gateway_events},
    naia_tools::ToolBridge,
    tokio::io::BufReader,
};

use crate::host::Host;

/// Stdio host: JSON-line requests on stdin, `ShellChunk` lines on stdout.
///
/// Logs go to stderr so stdout stays a clean protocol channel.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = naia_config::discover_and_load(None).context("failed to load configuration")?;

    let client = GatewayClient::with_request_timeout(Duration::from_secs(
        config.gateway.request_timeout_secs,
    ));
    let options = ConnectOptions::from_config(&config.gateway);
    match client.connect(&config.gateway.url, &options).await {
        Ok(hello) => tracing::info!(
            url = %config.gateway.url,
            protocol = hello.protocol,
            methods = hello.features.methods.len(),
            "connected to gateway"
        ),
        Err(e) => tracing::warn!(
            url = %config.gateway.url,
            error = %e,
            "gateway unavailable, requests will report it"
        ),
    }

    let sink: Arc<dyn OutputSink> = Arc::new(JsonLinesSink::stdout());
    forward_gateway_events(&client, Arc::clone(&sink));

    let host = Host::new(
        ChatDelegate::from_config(client.clone(), &config.chat),
        ToolBridge::from_config(client.clone(), &config.tools),
        sink,
    );
    host.run(BufReader::new(tokio::io::stdin()))
        .await
        .context("failed to read stdin")?;

    client.close();
    Ok(())
}

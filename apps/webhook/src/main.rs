use anyhow::Result;
use greeter_telemetry::install as init_telemetry;
use greeter_webhook::WebhookConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry("greeter-webhook", env!("CARGO_PKG_VERSION"))?;
    let config = WebhookConfig::from_env()?;
    greeter_webhook::run(config).await
}

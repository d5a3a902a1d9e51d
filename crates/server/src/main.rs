#[tokio::main]
async fn main() -> anyhow::Result<()> {
    intake_server::start().await
}

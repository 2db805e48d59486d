#[tokio::main]
async fn main() -> anyhow::Result<()> {
    smartloop::run().await
}

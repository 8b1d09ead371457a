#[tokio::main]
async fn main() -> anyhow::Result<()> {
    astroweather::run().await
}

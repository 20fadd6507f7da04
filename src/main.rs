use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    trolley_cli::cli::run().await
}

#[tokio::main]
async fn main() {
    if let Err(error) = portfolio_sync_lib::run().await {
        tracing::error!(kind = error.kind(), "portfolio sync failed: {error}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reverse_admin::run_server().await
}

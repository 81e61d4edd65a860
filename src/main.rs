use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = bankbridge::args::parse();
    bankbridge::cli::main(args).await
}

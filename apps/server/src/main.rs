use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = supportflow_server::Args::parse();
    supportflow_server::run(args).await
}

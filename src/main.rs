use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tencentcloud_vpc_provider::{init_logging_with_default, serve_with_options, ServeOptions, TencentCloudProvider};
use tracing::error;

/// Tencent Cloud VPC provider plugin
#[derive(Parser, Debug)]
#[command(name = "tencentcloud-vpc-provider", version, about, long_about = None)]
struct Args {
    /// Address to listen on; port 0 picks a free port
    #[arg(long, env = "TENCENTCLOUD_PROVIDER_ADDRESS", default_value = "127.0.0.1:0")]
    address: SocketAddr,

    /// Seconds to drain in-flight requests after SIGTERM/SIGINT
    #[arg(long, default_value_t = 30)]
    shutdown_timeout: u64,

    /// Default log level when neither RUST_LOG nor TF_LOG is set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging_with_default(&args.log_level);

    let options = ServeOptions::new()
        .with_address(args.address)
        .with_shutdown_timeout(Duration::from_secs(args.shutdown_timeout));

    match serve_with_options(TencentCloudProvider::new(), options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "provider server failed");
            ExitCode::FAILURE
        },
    }
}

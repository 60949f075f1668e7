#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use content_testing_http::{serve, ServeConfig};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7800";

#[derive(Parser, Debug)]
#[command(name = "content-testing", about = "Serves the active content-test listing")]
struct Cli {
    /// Directory holding listing.json and the .content-tests snapshots.
    #[arg(long, env = "CONTENT_TESTING_DATA_DIR", default_value = "./data")]
    data_dir: String,
    #[arg(long, env = "CONTENT_TESTING_BIND_ADDR")]
    bind_addr: Option<String>,
    #[arg(long, env = "CONTENT_TESTING_PORT")]
    port: Option<u16>,
}

impl Cli {
    /// An explicit bind address wins over a bare port.
    fn resolve_bind_addr(&self) -> String {
        if let Some(bind_addr) = &self.bind_addr {
            return bind_addr.clone();
        }
        if let Some(port) = self.port {
            return format!("127.0.0.1:{port}");
        }
        DEFAULT_BIND_ADDR.to_string()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let bind_addr = cli.resolve_bind_addr();
    serve(ServeConfig {
        data_dir: cli.data_dir.into(),
        bind_addr,
    })
    .await
}

use clap::Parser;

const LOCALHOST_URL: &str = "http://localhost:8545";

#[derive(Clone, Debug, Default, Parser)]
pub struct RpcOpts {
    /// The RPC endpoint. It must support `debug_traceTransaction`.
    #[arg(short = 'r', long = "rpc-url", env = "ETH_RPC_URL")]
    pub url: Option<String>,
}

impl RpcOpts {
    /// Returns the RPC endpoint, `http://localhost:8545` by default.
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(LOCALHOST_URL)
    }
}

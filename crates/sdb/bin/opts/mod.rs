mod artifacts;
mod cache;
mod rpc;

pub use artifacts::ArtifactOpts;
pub use cache::CacheOpts;
pub use rpc::RpcOpts;

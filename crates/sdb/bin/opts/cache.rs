use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize, Parser)]
pub struct CacheOpts {
    /// The root directory for the cache. If not provided, the default is `~/.sdb/cache`.
    #[clap(long, env = "SDB_CACHE_ROOT", conflicts_with = "no_cache")]
    pub cache_root: Option<PathBuf>,

    /// Do not use the cache.
    #[clap(long, conflicts_with = "cache_root")]
    pub no_cache: bool,
}

mod cache;

pub use cache::CacheOpts;

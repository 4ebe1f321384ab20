mod tagcache_error;

pub use tagcache_error::*;

use std::time::Duration;

use log::debug;
use redis::ConnectionLike;

use crate::config::{Config, DEFAULT_SLOW_LOG};
use crate::conn::RedisConn;
use crate::context::Context;
use crate::errors::{unsupported_operation, TagcacheResult};
use crate::item::Item;
use crate::key::check_key;
use crate::reply::{Replies, Reply};
use crate::source::{ConnectionSource, Dialer};

/// The client type.
///
/// Every call takes a fresh connection from its [`ConnectionSource`], runs
/// one command on it and releases it before returning. `get` and
/// `get_multi` are the exception: their connection travels with the
/// returned [`Reply`] or [`Replies`] and is released once those are drained,
/// closed or dropped.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tagcache::{Config, Context, Item, Tagcache};
///
/// fn do_something() -> tagcache::TagcacheResult<()> {
///     let second = Duration::from_secs(1);
///     let cache = Tagcache::new(Config::new("127.0.0.1:6379").timeouts(second, second, second))?;
///     let ctx = Context::with_timeout(second);
///
///     cache.set(&ctx, &Item::new("greeting", "hello"))?;
///     let greeting: String = cache.get(&ctx, "greeting").scan()?;
///     assert_eq!(greeting, "hello");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Tagcache<S: ConnectionSource = Dialer> {
    source: S,
    slow_log: Duration,
}

impl Tagcache<Dialer> {
    /// Creates a client that dials a new connection for every call.
    ///
    /// Fails with [`ErrorKind::InvalidConfig`](crate::ErrorKind::InvalidConfig)
    /// if any of the dial, read or write timeouts is missing.
    pub fn new(config: Config) -> TagcacheResult<Tagcache<Dialer>> {
        let dialer = Dialer::new(config)?;
        let slow_log = dialer.config().slow_log_threshold();
        Ok(Tagcache {
            source: dialer,
            slow_log,
        })
    }
}

#[cfg(feature = "r2d2")]
#[cfg_attr(docsrs, doc(cfg(feature = "r2d2")))]
impl Tagcache<r2d2::Pool<redis::Client>> {
    /// Creates a client on top of a pool built by [`Config::pool`], keeping
    /// the configured slow log threshold.
    pub fn from_pool(config: Config, max_size: u32) -> TagcacheResult<Self> {
        let pool = config.pool(max_size)?;
        Ok(Tagcache {
            source: pool,
            slow_log: config.slow_log_threshold(),
        })
    }
}

impl<S: ConnectionSource> Tagcache<S> {
    /// Creates a client on top of any connection source. The slow log
    /// threshold starts at [`DEFAULT_SLOW_LOG`], see [`Tagcache::slow_log`].
    pub fn with_source(source: S) -> Tagcache<S> {
        Tagcache {
            source,
            slow_log: DEFAULT_SLOW_LOG,
        }
    }

    /// Sets the threshold above which commands are logged as slow.
    pub fn slow_log(mut self, threshold: Duration) -> Tagcache<S> {
        self.slow_log = threshold;
        self
    }

    /// Returns the threshold above which commands are logged as slow.
    pub fn slow_log_threshold(&self) -> Duration {
        self.slow_log
    }

    /// Returns the connection source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Acquires a connection directly. The caller is responsible for
    /// closing it.
    pub fn conn(&self, ctx: &Context) -> TagcacheResult<RedisConn<S::Connection>> {
        let con = self.source.get_connection(ctx)?;
        debug!("acquired connection (db {})", con.get_db());
        Ok(RedisConn::with_slow_log(con, self.slow_log))
    }

    /// Runs `f` on a fresh connection once `key` passed validation.
    fn with_conn<T, F>(&self, ctx: &Context, key: &str, f: F) -> TagcacheResult<T>
    where
        F: FnOnce(&mut RedisConn<S::Connection>) -> TagcacheResult<T>,
    {
        check_key(key)?;
        let mut conn = self.conn(ctx)?;
        let result = f(&mut conn);
        conn.close();
        result
    }

    /// Writes the given item, unconditionally.
    pub fn set(&self, ctx: &Context, item: &Item) -> TagcacheResult<()> {
        self.with_conn(ctx, &item.key, |conn| conn.set(ctx, item))
    }

    /// Writes the given item, if no value already exists for its key.
    /// Fails with [`ErrorKind::NotStored`](crate::ErrorKind::NotStored) otherwise.
    pub fn add(&self, ctx: &Context, item: &Item) -> TagcacheResult<()> {
        self.with_conn(ctx, &item.key, |conn| conn.add(ctx, item))
    }

    /// Writes the given item, but only if the server already holds data for
    /// this key. Fails with [`ErrorKind::NotStored`](crate::ErrorKind::NotStored)
    /// otherwise.
    pub fn replace(&self, ctx: &Context, item: &Item) -> TagcacheResult<()> {
        self.with_conn(ctx, &item.key, |conn| conn.replace(ctx, item))
    }

    /// Always fails with
    /// [`ErrorKind::UnsupportedOperation`](crate::ErrorKind::UnsupportedOperation),
    /// without acquiring a connection.
    pub fn compare_and_swap(&self, _ctx: &Context, _item: &Item) -> TagcacheResult<()> {
        Err(unsupported_operation("compare-and-swap"))
    }

    /// Fetches the item stored under `key`.
    ///
    /// Errors, including a failure to acquire a connection, are reported by
    /// the returned reply.
    pub fn get(&self, ctx: &Context, key: &str) -> Reply<S::Connection> {
        if let Err(err) = check_key(key) {
            return Reply::failed(err);
        }
        match self.conn(ctx) {
            Ok(mut conn) => {
                let result = conn.get(ctx, key);
                Reply::new(result, conn)
            }
            Err(err) => Reply::failed(err),
        }
    }

    /// Batch version of [`get`](Tagcache::get).
    pub fn get_multi<K: AsRef<str>>(
        &self,
        ctx: &Context,
        keys: &[K],
    ) -> TagcacheResult<Replies<S::Connection>> {
        for key in keys {
            check_key(key.as_ref())?;
        }
        let mut conn = self.conn(ctx)?;
        match conn.get_multi(ctx, keys) {
            Ok(items) => Ok(Replies::new(items, conn)),
            Err(err) => {
                conn.close();
                Err(err)
            }
        }
    }

    /// Updates the expiry of `key` to `seconds` from now.
    pub fn touch(&self, ctx: &Context, key: &str, seconds: i32) -> TagcacheResult<()> {
        self.with_conn(ctx, key, |conn| conn.touch(ctx, key, seconds))
    }

    /// Deletes the item stored under `key`.
    pub fn delete(&self, ctx: &Context, key: &str) -> TagcacheResult<()> {
        self.with_conn(ctx, key, |conn| conn.delete(ctx, key))
    }

    /// Atomically increments the counter under `key` by `delta` and returns
    /// the new value. A missing key counts from zero.
    pub fn increment(&self, ctx: &Context, key: &str, delta: u64) -> TagcacheResult<u64> {
        self.with_conn(ctx, key, |conn| conn.increment(ctx, key, delta))
    }

    /// Atomically decrements the counter under `key` by `delta` and returns
    /// the new value.
    pub fn decrement(&self, ctx: &Context, key: &str, delta: u64) -> TagcacheResult<u64> {
        self.with_conn(ctx, key, |conn| conn.decrement(ctx, key, delta))
    }
}

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use redis::{Cmd, ConnectionLike, FromRedisValue};

use crate::config::DEFAULT_SLOW_LOG;
use crate::context::Context;
use crate::errors::{
    connection_closed, not_found, unsupported_operation, ErrorKind, TagcacheError, TagcacheResult,
};
use crate::item::{FromItem, Item};
use crate::key::check_key;

/// How a write treats a key that may or may not exist yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WriteMode {
    Always,
    IfAbsent,
    IfPresent,
}

/// A single backend connection speaking the memcache command set.
///
/// Every method validates its key before anything is sent, then issues
/// exactly one backend command. Backend failures are passed through as
/// [`ErrorKind::BackendFailure`].
pub struct RedisConn<C: ConnectionLike> {
    con: C,
    slow_log: Duration,
}

impl<C: ConnectionLike> RedisConn<C> {
    /// Wraps an established connection.
    pub fn new(con: C) -> RedisConn<C> {
        RedisConn::with_slow_log(con, DEFAULT_SLOW_LOG)
    }

    /// Wraps an established connection, logging commands slower than `slow_log`.
    pub fn with_slow_log(con: C, slow_log: Duration) -> RedisConn<C> {
        RedisConn { con, slow_log }
    }

    /// Returns an error if the underlying connection is no longer usable.
    pub fn err(&self) -> Option<TagcacheError> {
        if self.con.is_open() {
            None
        } else {
            Some(connection_closed())
        }
    }

    /// Releases the connection.
    pub fn close(self) {
        debug!("closing connection (db {})", self.con.get_db());
        drop(self.con);
    }

    /// Returns the wrapped connection.
    pub fn into_inner(self) -> C {
        self.con
    }

    fn query<T: FromRedisValue>(
        &mut self,
        ctx: &Context,
        verb: &'static str,
        cmd: &Cmd,
    ) -> TagcacheResult<T> {
        ctx.check()?;
        let started = Instant::now();
        let result = cmd.query(&mut self.con);
        let elapsed = started.elapsed();
        if elapsed > self.slow_log {
            warn!("slow command {verb} took {elapsed:?}");
        } else {
            trace!("{verb} took {elapsed:?}");
        }
        Ok(result?)
    }

    fn store(&mut self, ctx: &Context, item: &Item, mode: WriteMode) -> TagcacheResult<()> {
        check_key(&item.key)?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(&item.key).arg(&item.value);
        if item.expiration > 0 {
            cmd.arg("EX").arg(item.expiration);
        }
        match mode {
            WriteMode::Always => {}
            WriteMode::IfAbsent => {
                cmd.arg("NX");
            }
            WriteMode::IfPresent => {
                cmd.arg("XX");
            }
        }
        // A conditional SET answers nil when its condition does not hold.
        let stored: Option<String> = self.query(ctx, "SET", &cmd)?;
        if stored.is_none() {
            fail!((ErrorKind::NotStored, "key not stored", item.key.clone()));
        }
        Ok(())
    }

    /// Writes the given item, unconditionally.
    pub fn set(&mut self, ctx: &Context, item: &Item) -> TagcacheResult<()> {
        self.store(ctx, item, WriteMode::Always)
    }

    /// Writes the given item, if no value already exists for its key.
    pub fn add(&mut self, ctx: &Context, item: &Item) -> TagcacheResult<()> {
        self.store(ctx, item, WriteMode::IfAbsent)
    }

    /// Writes the given item, but only if the server already holds data
    /// for this key.
    pub fn replace(&mut self, ctx: &Context, item: &Item) -> TagcacheResult<()> {
        self.store(ctx, item, WriteMode::IfPresent)
    }

    /// Fetches the item stored under `key`.
    pub fn get(&mut self, ctx: &Context, key: &str) -> TagcacheResult<Item> {
        check_key(key)?;
        let value: Option<Vec<u8>> = self.query(ctx, "GET", redis::cmd("GET").arg(key))?;
        match value {
            Some(value) => Ok(Item::new(key, value)),
            None => Err(not_found()),
        }
    }

    /// Fetches several items with a single `MGET`.
    ///
    /// Keys the server holds no value for are left out of the result. Every
    /// key is validated before the command is built, so one malformed key
    /// fails the whole call without touching the server.
    pub fn get_multi<K: AsRef<str>>(
        &mut self,
        ctx: &Context,
        keys: &[K],
    ) -> TagcacheResult<HashMap<String, Item>> {
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            let key = key.as_ref();
            check_key(key)?;
            cmd.arg(key);
        }
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let values: Vec<Option<Vec<u8>>> = self.query(ctx, "MGET", &cmd)?;
        if values.len() != keys.len() {
            fail!((
                ErrorKind::BackendFailure,
                "MGET answered with a different number of values",
                format!("expected {}, got {}", keys.len(), values.len())
            ));
        }
        // The i-th value belongs to the i-th requested key.
        Ok(keys
            .iter()
            .zip(values)
            .filter_map(|(key, value)| {
                let key = key.as_ref();
                value.map(|value| (key.to_string(), Item::new(key, value)))
            })
            .collect())
    }

    /// Deletes the item stored under `key`. Deleting a missing key succeeds.
    pub fn delete(&mut self, ctx: &Context, key: &str) -> TagcacheResult<()> {
        check_key(key)?;
        let _: i64 = self.query(ctx, "DEL", redis::cmd("DEL").arg(key))?;
        Ok(())
    }

    fn incr_decr(
        &mut self,
        ctx: &Context,
        verb: &'static str,
        key: &str,
        delta: u64,
    ) -> TagcacheResult<u64> {
        check_key(key)?;
        let value: i64 = self.query(ctx, verb, redis::cmd(verb).arg(key).arg(delta))?;
        u64::try_from(value).map_err(|_| {
            TagcacheError::from((
                ErrorKind::Decode,
                "counter dropped below zero",
                format!("{key} = {value}"),
            ))
        })
    }

    /// Atomically increments the counter under `key` by `delta`.
    pub fn increment(&mut self, ctx: &Context, key: &str, delta: u64) -> TagcacheResult<u64> {
        self.incr_decr(ctx, "INCRBY", key, delta)
    }

    /// Atomically decrements the counter under `key` by `delta`.
    pub fn decrement(&mut self, ctx: &Context, key: &str, delta: u64) -> TagcacheResult<u64> {
        self.incr_decr(ctx, "DECRBY", key, delta)
    }

    /// Always fails: the backend has no compare-and-swap primitive.
    pub fn compare_and_swap(&mut self, _ctx: &Context, _item: &Item) -> TagcacheResult<()> {
        Err(unsupported_operation("compare-and-swap"))
    }

    /// Updates the expiry of `key` to `seconds` from now.
    pub fn touch(&mut self, ctx: &Context, key: &str, seconds: i32) -> TagcacheResult<()> {
        check_key(key)?;
        let _: i64 = self.query(ctx, "EXPIRE", redis::cmd("EXPIRE").arg(key).arg(seconds))?;
        Ok(())
    }

    /// Decodes a fetched item into `T`.
    pub fn scan<T: FromItem>(&self, item: &Item) -> TagcacheResult<T> {
        scan_item(item)
    }
}

pub(crate) fn scan_item<T: FromItem>(item: &Item) -> TagcacheResult<T> {
    T::from_item(item).map_err(|err| err.context("cannot scan item", &item.key))
}

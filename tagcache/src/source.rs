use log::debug;
use redis::{Client, Connection, ConnectionLike};

use crate::config::Config;
use crate::context::Context;
use crate::errors::TagcacheResult;

/// Hands out backend connections, one per cache call.
///
/// A connection taken from a source is released by dropping it: a dialed
/// connection is closed, a pooled one goes back to its pool.
pub trait ConnectionSource {
    /// The connection type this source produces.
    type Connection: ConnectionLike;

    /// Acquires a connection, honoring the deadline of `ctx`.
    fn get_connection(&self, ctx: &Context) -> TagcacheResult<Self::Connection>;
}

impl<S: ConnectionSource + ?Sized> ConnectionSource for &S {
    type Connection = S::Connection;

    fn get_connection(&self, ctx: &Context) -> TagcacheResult<Self::Connection> {
        (**self).get_connection(ctx)
    }
}

/// Dials a fresh connection for every call.
#[derive(Debug, Clone)]
pub struct Dialer {
    client: Client,
    config: Config,
}

impl Dialer {
    /// Validates `config` and prepares a dialer for it. Nothing is dialed yet.
    pub fn new(config: Config) -> TagcacheResult<Dialer> {
        let config = config.validate()?;
        let client = Client::open(config.connection_info()?)?;
        Ok(Dialer { client, config })
    }

    /// Returns the validated configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl ConnectionSource for Dialer {
    type Connection = Connection;

    fn get_connection(&self, ctx: &Context) -> TagcacheResult<Connection> {
        ctx.check()?;
        let con = self
            .client
            .get_connection_with_timeout(ctx.clamp(self.config.dial_timeout))?;
        con.set_read_timeout(Some(ctx.clamp(self.config.read_timeout)))?;
        con.set_write_timeout(Some(ctx.clamp(self.config.write_timeout)))?;
        debug!("dialed {} (db {})", self.config.addr, self.config.db);
        Ok(con)
    }
}

#[cfg(feature = "r2d2")]
pub(crate) use self::pool::SocketTimeouts;
#[cfg(feature = "r2d2")]
pub use self::pool::PooledConnection;

#[cfg(feature = "r2d2")]
mod pool {
    use std::time::Duration;

    use redis::{Client, Connection, ConnectionLike, RedisError, RedisResult, Value};

    use super::ConnectionSource;
    use crate::context::Context;
    use crate::errors::{ErrorKind, TagcacheError, TagcacheResult};

    /// Applies the configured socket timeouts to every connection the pool
    /// opens.
    #[derive(Debug)]
    pub(crate) struct SocketTimeouts {
        pub(crate) read: Duration,
        pub(crate) write: Duration,
    }

    impl r2d2::CustomizeConnection<Connection, RedisError> for SocketTimeouts {
        fn on_acquire(&self, con: &mut Connection) -> Result<(), RedisError> {
            con.set_read_timeout(Some(self.read))?;
            con.set_write_timeout(Some(self.write))
        }
    }

    /// A connection checked out of an `r2d2` pool. Dropping it hands it back.
    pub struct PooledConnection(r2d2::PooledConnection<Client>);

    impl ConnectionLike for PooledConnection {
        fn req_packed_command(&mut self, cmd: &[u8]) -> RedisResult<Value> {
            self.0.req_packed_command(cmd)
        }

        fn req_packed_commands(
            &mut self,
            cmd: &[u8],
            offset: usize,
            count: usize,
        ) -> RedisResult<Vec<Value>> {
            self.0.req_packed_commands(cmd, offset, count)
        }

        fn get_db(&self) -> i64 {
            self.0.get_db()
        }

        fn check_connection(&mut self) -> bool {
            self.0.check_connection()
        }

        fn is_open(&self) -> bool {
            self.0.is_open()
        }
    }

    impl ConnectionSource for r2d2::Pool<Client> {
        type Connection = PooledConnection;

        fn get_connection(&self, ctx: &Context) -> TagcacheResult<PooledConnection> {
            ctx.check()?;
            let con = match ctx.remaining() {
                Some(remaining) => self.get_timeout(remaining.max(Duration::from_millis(1))),
                None => self.get(),
            }
            .map_err(|err| {
                TagcacheError::from((
                    ErrorKind::PoolExhausted,
                    "connection pool exhausted",
                    err.to_string(),
                ))
            })?;
            Ok(PooledConnection(con))
        }
    }
}

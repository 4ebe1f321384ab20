use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::errors::{ErrorKind, TagcacheError, TagcacheResult};

/// Slow log threshold used when none is configured.
pub const DEFAULT_SLOW_LOG: Duration = Duration::from_millis(250);

const DEFAULT_PORT: u16 = 6379;

/// The transport used to reach the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Protocol {
    /// `host:port` over TCP.
    #[default]
    Tcp,
    /// A unix domain socket path.
    Unix,
}

/// Connection settings for a [`Tagcache`](crate::Tagcache) client.
///
/// The dial, read and write timeouts have no defaults and must all be set;
/// [`Config::validate`] rejects a configuration where any of them is zero.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Transport of `addr`.
    pub proto: Protocol,
    /// `host[:port]` for TCP, a socket path for unix sockets.
    pub addr: String,
    /// Password sent with `AUTH` right after connecting.
    pub auth: Option<String>,
    /// Database selected right after connecting.
    pub db: i64,
    /// Upper bound for establishing a connection.
    pub dial_timeout: Duration,
    /// Upper bound for reading a reply.
    pub read_timeout: Duration,
    /// Upper bound for writing a command.
    pub write_timeout: Duration,
    /// Commands slower than this are logged. Defaults to 250ms.
    pub slow_log: Option<Duration>,
}

impl Config {
    /// Creates a TCP configuration for `addr` with all timeouts unset.
    pub fn new<A: Into<String>>(addr: A) -> Config {
        Config {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Creates a unix socket configuration with all timeouts unset.
    pub fn unix<P: Into<String>>(path: P) -> Config {
        Config {
            proto: Protocol::Unix,
            addr: path.into(),
            ..Default::default()
        }
    }

    /// Sets the password.
    pub fn auth<S: Into<String>>(mut self, password: S) -> Config {
        self.auth = Some(password.into());
        self
    }

    /// Sets the database index.
    pub fn db(mut self, db: i64) -> Config {
        self.db = db;
        self
    }

    /// Sets the dial, read and write timeouts at once.
    pub fn timeouts(mut self, dial: Duration, read: Duration, write: Duration) -> Config {
        self.dial_timeout = dial;
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }

    /// Sets the slow log threshold.
    pub fn slow_log(mut self, threshold: Duration) -> Config {
        self.slow_log = Some(threshold);
        self
    }

    /// Returns the effective slow log threshold.
    pub fn slow_log_threshold(&self) -> Duration {
        match self.slow_log {
            Some(threshold) if !threshold.is_zero() => threshold,
            _ => DEFAULT_SLOW_LOG,
        }
    }

    /// Checks the mandatory timeouts and fills in the slow log default.
    pub fn validate(mut self) -> TagcacheResult<Config> {
        for (name, timeout) in [
            ("dial_timeout", self.dial_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ] {
            if timeout.is_zero() {
                fail!((
                    ErrorKind::InvalidConfig,
                    "timeouts must be configured",
                    name.to_string()
                ));
            }
        }
        self.slow_log = Some(self.slow_log_threshold());
        Ok(self)
    }

    /// Builds the connection info the backend client dials with.
    pub fn connection_info(&self) -> TagcacheResult<ConnectionInfo> {
        let addr = match self.proto {
            Protocol::Tcp => {
                let (host, port) = split_host_port(&self.addr)?;
                ConnectionAddr::Tcp(host, port)
            }
            #[cfg(unix)]
            Protocol::Unix => {
                if self.addr.is_empty() {
                    fail!((ErrorKind::InvalidConfig, "missing unix socket path"));
                }
                ConnectionAddr::Unix(self.addr.clone().into())
            }
            #[cfg(not(unix))]
            Protocol::Unix => fail!((
                ErrorKind::InvalidConfig,
                "unix sockets are not supported on this platform"
            )),
        };
        Ok(ConnectionInfo {
            addr,
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.auth.clone().filter(|auth| !auth.is_empty()),
                ..Default::default()
            },
        })
    }

    /// Creates a connection pool with `max_size` connections. The dial
    /// timeout bounds each checkout, the read and write timeouts are set on
    /// every connection the pool opens.
    #[cfg(feature = "r2d2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "r2d2")))]
    pub fn pool(&self, max_size: u32) -> TagcacheResult<r2d2::Pool<redis::Client>> {
        let config = self.clone().validate()?;
        let client = redis::Client::open(config.connection_info()?)?;
        r2d2::Pool::builder()
            .max_size(max_size)
            .connection_timeout(config.dial_timeout)
            .connection_customizer(Box::new(crate::source::SocketTimeouts {
                read: config.read_timeout,
                write: config.write_timeout,
            }))
            .build(client)
            .map_err(|err| {
                TagcacheError::from((
                    ErrorKind::PoolExhausted,
                    "cannot fill connection pool",
                    err.to_string(),
                ))
            })
    }
}

fn split_host_port(addr: &str) -> TagcacheResult<(String, u16)> {
    if addr.is_empty() {
        fail!((ErrorKind::InvalidConfig, "missing server address"));
    }
    // Bracketed IPv6 literals keep their colons.
    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port))
            if !host.ends_with(':') && (!host.contains(':') || host.ends_with(']')) =>
        {
            let port = port.parse::<u16>().map_err(|_| {
                TagcacheError::from((
                    ErrorKind::InvalidConfig,
                    "invalid port",
                    addr.to_string(),
                ))
            })?;
            (host, port)
        }
        _ => (addr, DEFAULT_PORT),
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        fail!((ErrorKind::InvalidConfig, "missing host", addr.to_string()));
    }
    Ok((host.to_string(), port))
}

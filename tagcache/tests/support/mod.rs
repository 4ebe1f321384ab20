#![allow(dead_code)]

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use redis::{ConnectionLike, RedisResult, Value};
use redis_test::{MockCmd, MockRedisConnection};
use tagcache::{Config, ConnectionSource, Context, Tagcache, TagcacheResult};

/// Counts how many connections were handed out and how many were dropped.
#[derive(Clone, Default)]
pub struct Counters {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.acquired() - self.released()
    }
}

/// A mock connection that reports its own release.
pub struct TrackedConnection {
    inner: MockRedisConnection,
    counters: Counters,
}

impl Drop for TrackedConnection {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl ConnectionLike for TrackedConnection {
    fn req_packed_command(&mut self, cmd: &[u8]) -> RedisResult<Value> {
        self.inner.req_packed_command(cmd)
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        offset: usize,
        count: usize,
    ) -> RedisResult<Vec<Value>> {
        self.inner.req_packed_commands(cmd, offset, count)
    }

    fn get_db(&self) -> i64 {
        self.inner.get_db()
    }

    fn check_connection(&mut self) -> bool {
        true
    }

    fn is_open(&self) -> bool {
        true
    }
}

/// Hands out connections that all answer from one scripted command queue.
pub struct MockSource {
    mock: MockRedisConnection,
    counters: Counters,
}

impl MockSource {
    pub fn new<I: IntoIterator<Item = MockCmd>>(commands: I) -> MockSource {
        MockSource {
            mock: MockRedisConnection::new(commands),
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

impl ConnectionSource for MockSource {
    type Connection = TrackedConnection;

    fn get_connection(&self, ctx: &Context) -> TagcacheResult<TrackedConnection> {
        ctx.check()?;
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(TrackedConnection {
            inner: self.mock.clone(),
            counters: self.counters.clone(),
        })
    }
}

/// A client over scripted commands, plus the counters of its source.
pub fn mock_cache<I: IntoIterator<Item = MockCmd>>(
    commands: I,
) -> (Tagcache<MockSource>, Counters) {
    let source = MockSource::new(commands);
    let counters = source.counters();
    (Tagcache::with_source(source), counters)
}

pub fn one_second_config(addr: &str) -> Config {
    let second = Duration::from_secs(1);
    Config::new(addr).timeouts(second, second, second)
}

fn get_random_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind to a free port");
    listener.local_addr().expect("local addr").port()
}

/// A throwaway `redis-server` listening on a random local port.
pub struct RedisServer {
    process: Child,
    port: u16,
}

impl RedisServer {
    /// Starts a server. Panics if no `redis-server` binary is available.
    pub fn start() -> RedisServer {
        let port = get_random_available_port();
        let process = Command::new("redis-server")
            .arg("--port")
            .arg(port.to_string())
            .arg("--save")
            .arg("")
            .arg("--appendonly")
            .arg("no")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let process = match process {
            Ok(process) => process,
            Err(err) => panic!("failed to start redis-server, is it on the PATH? {err}"),
        };
        let server = RedisServer { process, port };
        server.wait_until_ready();
        server
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    fn wait_until_ready(&self) {
        let client = redis::Client::open(("127.0.0.1", self.port)).expect("client");
        for _ in 0..100 {
            if let Ok(mut con) = client.get_connection() {
                if con.check_connection() {
                    return;
                }
            }
            sleep(Duration::from_millis(20));
        }
        panic!("redis-server on port {} did not come up", self.port);
    }
}

impl Drop for RedisServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// A running server and a client pointing at it.
pub struct TestContext {
    pub server: RedisServer,
    pub cache: Tagcache,
}

impl TestContext {
    pub fn new() -> TestContext {
        let server = RedisServer::start();
        let cache = Tagcache::new(one_second_config(&server.addr())).expect("client");
        TestContext { server, cache }
    }

    /// A raw backend connection, for checking what the client wrote.
    pub fn connection(&self) -> redis::Connection {
        redis::Client::open(format!("redis://{}/", self.server.addr()))
            .and_then(|client| client.get_connection())
            .expect("raw connection")
    }
}

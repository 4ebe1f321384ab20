//! tagcache exposes a Redis connection through a memcache style client
//! interface, so code written against `get`/`set`/`add`/`replace`/`delete`/
//! `increment`/`decrement`/`touch` can run on a Redis server unchanged.
//!
//! The crate is called `tagcache` and you can depend on it via cargo:
//!
//! ```ini
//! [dependencies.tagcache]
//! version = "*"
//! ```
//!
//! # Basic Operation
//!
//! A [`Tagcache`] client is built from a [`Config`]. The dial, read and
//! write timeouts are mandatory; building a client without them fails with
//! [`ErrorKind::InvalidConfig`].
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tagcache::{Config, Context, Item, Tagcache};
//!
//! fn do_something() -> tagcache::TagcacheResult<()> {
//!     let second = Duration::from_secs(1);
//!     let config = Config::new("127.0.0.1:6379").timeouts(second, second, second);
//!     let cache = Tagcache::new(config)?;
//!     let ctx = Context::background();
//!
//!     cache.set(&ctx, &Item::new("a", "1"))?;
//!     let hits = cache.increment(&ctx, "hits", 1)?;
//!
//!     let mut replies = cache.get_multi(&ctx, &["a", "b"])?;
//!     for key in replies.keys() {
//!         let value: String = replies.scan(&key)?;
//!         println!("{key} = {value} ({hits} hits)");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Connection Handling
//!
//! Every call acquires its own connection from a [`ConnectionSource`] and
//! releases it before returning. The default source, [`Dialer`], dials a
//! new connection per call. With the `r2d2` feature an
//! `r2d2::Pool<redis::Client>` can be used instead, see `Tagcache::from_pool`.
//!
//! Keys are checked and `compare_and_swap` is refused before any connection
//! is acquired.
//!
//! `get` and `get_multi` hand their connection to the returned [`Reply`] or
//! [`Replies`], which release it once every fetched item was scanned, on the
//! first error, or when they are closed or dropped.
//!
//! ## Keys
//!
//! Keys are validated before anything is dialed or sent: they must be 1 to
//! 250 bytes long and must not contain whitespace or control characters,
//! see [`legal_key`].
//!
//! ## Optional Features
//!
//! * `json`: structured values through [`Json`] and [`Item::json`] (enabled by default)
//! * `r2d2`: enables r2d2 connection pool support (optional)

#![deny(non_camel_case_types)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, warn(rustdoc::broken_intra_doc_links))]
#![cfg_attr(docsrs, feature(doc_cfg))]

// preserve grouping and order
#[rustfmt::skip]
pub use crate::{
    // client and connections
    client::Tagcache,
    conn::RedisConn,
    source::{ConnectionSource, Dialer},

    // cursors
    reply::{Reply, Replies},

    // configuration
    config::{Config, Protocol, DEFAULT_SLOW_LOG},
    context::{CancelHandle, Context},

    // items
    item::{FromItem, Item, FLAG_GOB, FLAG_GZIP, FLAG_JSON, FLAG_PROTOBUF, FLAG_RAW},
    key::{legal_key, MAX_KEY_LENGTH},

    // error and result types
    errors::{ErrorKind, TagcacheError, TagcacheResult},
};

#[cfg(feature = "json")]
pub use crate::item::Json;

#[cfg(feature = "r2d2")]
pub use crate::source::PooledConnection;

mod macros;

mod client;
mod config;
mod conn;
mod context;
mod errors;
mod item;
mod key;
mod reply;
mod source;

use std::collections::{HashMap, HashSet};

use redis::ConnectionLike;

use crate::conn::RedisConn;
use crate::errors::{connection_closed, not_found, TagcacheError, TagcacheResult};
use crate::item::{FromItem, Item};

/// The result of a single `get`.
///
/// The reply owns the connection the item was fetched on until the item is
/// scanned, the reply is closed, or it is dropped. After that every scan
/// returns the error the reply ended with, or
/// [`ErrorKind::ConnectionClosed`](crate::ErrorKind::ConnectionClosed) if it
/// ended without one.
pub struct Reply<C: ConnectionLike> {
    err: Option<TagcacheError>,
    item: Option<Item>,
    conn: Option<RedisConn<C>>,
}

impl<C: ConnectionLike> Reply<C> {
    pub(crate) fn new(result: TagcacheResult<Item>, conn: RedisConn<C>) -> Reply<C> {
        match result {
            Ok(item) => Reply {
                err: None,
                item: Some(item),
                conn: Some(conn),
            },
            Err(err) => {
                conn.close();
                Reply::failed(err)
            }
        }
    }

    pub(crate) fn failed(err: TagcacheError) -> Reply<C> {
        Reply {
            err: Some(err),
            item: None,
            conn: None,
        }
    }

    /// Returns the error the fetch or a failed scan ended with.
    pub fn err(&self) -> Option<&TagcacheError> {
        self.err.as_ref()
    }

    /// Returns the fetched item.
    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    /// Decodes the item into `T` and releases the connection.
    pub fn scan<T: FromItem>(&mut self) -> TagcacheResult<T> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let (Some(conn), Some(item)) = (self.conn.take(), self.item.as_ref()) else {
            return Err(connection_closed());
        };
        let result = conn.scan(item);
        conn.close();
        if let Err(err) = &result {
            self.err = Some(err.clone());
        }
        result
    }

    /// Releases the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }

    /// Returns true once the connection was released.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl<C: ConnectionLike> Drop for Reply<C> {
    fn drop(&mut self) {
        self.close();
    }
}

/// The result of a `get_multi`.
///
/// The connection is released once every fetched key was scanned, as soon
/// as a scan fails, or when the replies are closed or dropped.
pub struct Replies<C: ConnectionLike> {
    err: Option<TagcacheError>,
    items: HashMap<String, Item>,
    used_items: HashSet<String>,
    conn: Option<RedisConn<C>>,
}

impl<C: ConnectionLike> Replies<C> {
    pub(crate) fn new(items: HashMap<String, Item>, conn: RedisConn<C>) -> Replies<C> {
        let mut replies = Replies {
            err: None,
            used_items: HashSet::with_capacity(items.len()),
            items,
            conn: Some(conn),
        };
        if replies.items.is_empty() {
            replies.close();
        }
        replies
    }

    /// Decodes the item fetched for `key` into `T`.
    ///
    /// Asking for a key the server did not return fails with
    /// [`ErrorKind::NotFound`](crate::ErrorKind::NotFound) and closes the
    /// replies.
    pub fn scan<T: FromItem>(&mut self, key: &str) -> TagcacheResult<T> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let Some(item) = self.items.get(key) else {
            return Err(self.fail(not_found()));
        };
        let Some(conn) = &self.conn else {
            return Err(connection_closed());
        };
        let result = conn.scan(item);
        self.used_items.insert(key.to_string());
        match result {
            Err(err) => Err(self.fail(err)),
            Ok(value) => {
                if self.used_items.len() == self.items.len() {
                    self.close();
                }
                Ok(value)
            }
        }
    }

    fn fail(&mut self, err: TagcacheError) -> TagcacheError {
        self.close();
        self.err = Some(err.clone());
        err
    }

    /// Returns the keys the server held a value for, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    /// Returns the number of fetched items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the server held none of the requested keys.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Releases the connection. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
        }
    }

    /// Returns true once the connection was released.
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl<C: ConnectionLike> Drop for Replies<C> {
    fn drop(&mut self) {
        self.close();
    }
}

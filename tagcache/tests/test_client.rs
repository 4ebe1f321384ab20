mod support;

#[cfg(test)]
mod client {
    use std::io;
    use std::time::{Duration, Instant};

    use redis::{cmd, RedisError, Value};
    use redis_test::MockCmd;
    use tagcache::{Context, ErrorKind, Item, Tagcache};

    use crate::support::*;

    fn bulk(value: &str) -> Value {
        Value::BulkString(value.as_bytes().to_vec())
    }

    fn reset() -> RedisError {
        RedisError::from(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
    }

    #[test]
    fn test_set_get_roundtrip() {
        let (cache, counters) = mock_cache(vec![
            MockCmd::new(cmd("SET").arg("a").arg("1"), Ok(Value::Okay)),
            MockCmd::new(cmd("GET").arg("a"), Ok(bulk("1"))),
        ]);
        let ctx = Context::background();

        cache.set(&ctx, &Item::new("a", "1")).unwrap();
        assert_eq!(counters.open(), 0);

        let mut reply = cache.get(&ctx, "a");
        assert_eq!(counters.open(), 1);
        let value: String = reply.scan().unwrap();
        assert_eq!(value, "1");
        assert_eq!(counters.open(), 0);
        assert_eq!(counters.acquired(), 2);
    }

    #[test]
    fn test_get_missing_key_releases_immediately() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(cmd("GET").arg("a"), Ok(Value::Nil))]);
        let ctx = Context::background();

        let mut reply = cache.get(&ctx, "a");
        assert!(reply.is_closed());
        assert_eq!(counters.open(), 0);
        assert!(reply.scan::<String>().unwrap_err().is_not_found());
    }

    #[test]
    fn test_get_malformed_key() {
        let (cache, counters) = mock_cache(vec![]);
        let ctx = Context::background();

        let mut reply = cache.get(&ctx, "has space");
        assert!(reply.scan::<String>().unwrap_err().is_malformed_key());
        assert_eq!(counters.acquired(), 0);
    }

    #[test]
    fn test_abandoned_reply_releases_on_drop() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(cmd("GET").arg("a"), Ok(bulk("1")))]);
        let ctx = Context::background();

        let reply = cache.get(&ctx, "a");
        assert_eq!(counters.open(), 1);
        drop(reply);
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_get_multi_malformed_key_sends_nothing() {
        // Any command reaching the mock would fail as unexpected.
        let (cache, counters) = mock_cache(vec![]);
        let ctx = Context::background();

        let long = "k".repeat(251);
        for bad in ["", "tab\tkey", "del\u{7f}", long.as_str()] {
            let err = cache
                .get_multi(&ctx, &["good", bad, "also-good"])
                .err()
                .unwrap();
            assert_eq!(err.kind(), ErrorKind::MalformedKey, "key {bad:?}");
        }
        assert_eq!(counters.acquired(), 0);
    }

    #[test]
    fn test_get_multi_releases_after_last_scan() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(
            cmd("MGET").arg("a").arg("b").arg("c"),
            Ok(Value::Array(vec![bulk("1"), bulk("2"), bulk("3")])),
        )]);
        let ctx = Context::background();

        let mut replies = cache.get_multi(&ctx, &["a", "b", "c"]).unwrap();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(counters.released(), 0, "released before scan {i}");
            assert!(!replies.is_closed());
            let value: String = replies.scan(key).unwrap();
            assert_eq!(value, (i + 1).to_string());
        }
        assert!(replies.is_closed());
        assert_eq!(counters.released(), 1);

        replies.close();
        replies.close();
        drop(replies);
        assert_eq!(counters.released(), 1);
    }

    #[test]
    fn test_get_multi_missing_key() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(
            cmd("MGET").arg("a").arg("missing-key"),
            Ok(Value::Array(vec![bulk("1"), Value::Nil])),
        )]);
        let ctx = Context::background();

        let mut replies = cache.get_multi(&ctx, &["a", "missing-key"]).unwrap();
        assert_eq!(replies.keys(), vec!["a".to_string()]);
        assert_eq!(counters.open(), 1);

        let err = replies.scan::<String>("missing-key").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(replies.is_closed());
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_get_multi_nothing_found() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(
            cmd("MGET").arg("x").arg("y"),
            Ok(Value::Array(vec![Value::Nil, Value::Nil])),
        )]);
        let ctx = Context::background();

        let replies = cache.get_multi(&ctx, &["x", "y"]).unwrap();
        assert!(replies.is_empty());
        assert!(replies.is_closed());
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_get_multi_backend_failure() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(
            cmd("MGET").arg("a"),
            Err::<Value, _>(reset()),
        )]);
        let ctx = Context::background();

        let err = cache.get_multi(&ctx, &["a"]).err().unwrap();
        assert!(err.is_backend_failure());
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_compare_and_swap_is_unsupported() {
        let (cache, counters) = mock_cache(vec![]);
        let ctx = Context::background();

        for item in [
            Item::new("a", "1"),
            Item::new("", ""),
            Item::new("b", vec![0u8; 64]).with_expiration(10),
        ] {
            let err = cache.compare_and_swap(&ctx, &item).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        }
        assert_eq!(counters.acquired(), 0);
    }

    #[test]
    fn test_local_checks_never_dial() {
        // Nothing listens on port 1, so any dial would fail as a backend error.
        let cache = Tagcache::new(one_second_config("127.0.0.1:1")).unwrap();
        let ctx = Context::background();

        let err = cache.get_multi(&ctx, &["ok", "bad key"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MalformedKey);
        let err = cache.compare_and_swap(&ctx, &Item::new("a", "1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        let err = cache.set(&ctx, &Item::new("", "1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedKey);
        let err = cache.get(&ctx, &"k".repeat(251)).scan::<String>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedKey);
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_item_roundtrip() {
        use tagcache::Json;

        let (cache, _) = mock_cache(vec![
            MockCmd::new(cmd("SET").arg("g").arg("\"hello\""), Ok(Value::Okay)),
            MockCmd::new(cmd("GET").arg("g"), Ok(bulk("\"hello\""))),
            MockCmd::new(cmd("GET").arg("g"), Ok(bulk("\"hello\""))),
        ]);
        let ctx = Context::background();

        cache.set(&ctx, &Item::json("g", "hello").unwrap()).unwrap();
        let Json(value): Json<String> = cache.get(&ctx, "g").scan().unwrap();
        assert_eq!(value, "hello");
        // The stored text keeps its JSON quotes.
        let raw: String = cache.get(&ctx, "g").scan().unwrap();
        assert_eq!(raw, "\"hello\"");
    }

    #[test]
    fn test_add_and_replace() {
        let (cache, counters) = mock_cache(vec![
            MockCmd::new(cmd("SET").arg("a").arg("1").arg("NX"), Ok(Value::Okay)),
            MockCmd::new(cmd("SET").arg("a").arg("2").arg("NX"), Ok(Value::Nil)),
            MockCmd::new(cmd("SET").arg("b").arg("1").arg("XX"), Ok(Value::Nil)),
            MockCmd::new(cmd("SET").arg("a").arg("3").arg("XX"), Ok(Value::Okay)),
        ]);
        let ctx = Context::background();

        cache.add(&ctx, &Item::new("a", "1")).unwrap();
        assert_eq!(
            cache.add(&ctx, &Item::new("a", "2")).unwrap_err().kind(),
            ErrorKind::NotStored
        );
        assert_eq!(
            cache.replace(&ctx, &Item::new("b", "1")).unwrap_err().kind(),
            ErrorKind::NotStored
        );
        cache.replace(&ctx, &Item::new("a", "3")).unwrap();
        assert_eq!(counters.acquired(), 4);
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_counters_touch_and_delete() {
        let (cache, counters) = mock_cache(vec![
            MockCmd::new(cmd("INCRBY").arg("counter").arg(5u64), Ok(5i64)),
            MockCmd::new(cmd("DECRBY").arg("counter").arg(2u64), Ok(3i64)),
            MockCmd::new(cmd("EXPIRE").arg("counter").arg(60), Ok(1i64)),
            MockCmd::new(cmd("DEL").arg("counter"), Ok(1i64)),
            MockCmd::new(cmd("DEL").arg("counter"), Ok(0i64)),
        ]);
        let ctx = Context::background();

        assert_eq!(cache.increment(&ctx, "counter", 5).unwrap(), 5);
        assert_eq!(cache.decrement(&ctx, "counter", 2).unwrap(), 3);
        cache.touch(&ctx, "counter", 60).unwrap();
        cache.delete(&ctx, "counter").unwrap();
        // Deleting a key that is already gone is not an error.
        cache.delete(&ctx, "counter").unwrap();
        assert_eq!(counters.acquired(), 5);
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_connection_released_on_error() {
        let (cache, counters) = mock_cache(vec![
            MockCmd::new(cmd("INCRBY").arg("text").arg(1u64), Err::<Value, _>(reset())),
            MockCmd::new(cmd("SET").arg("a").arg("1"), Err::<Value, _>(reset())),
        ]);
        let ctx = Context::background();

        assert!(cache.increment(&ctx, "text", 1).unwrap_err().is_backend_failure());
        assert!(cache.set(&ctx, &Item::new("a", "1")).unwrap_err().is_backend_failure());
        assert!(cache.touch(&ctx, "bad key", 1).unwrap_err().is_malformed_key());
        assert!(cache.delete(&ctx, "").unwrap_err().is_malformed_key());
        // Malformed keys are rejected before a connection is taken.
        assert_eq!(counters.acquired(), 2);
        assert_eq!(counters.open(), 0);
    }

    #[test]
    fn test_expired_context_fails_fast() {
        let (cache, counters) = mock_cache(vec![]);
        let ctx = Context::with_deadline(Instant::now() - Duration::from_millis(1));

        let err = cache.set(&ctx, &Item::new("a", "1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(
            cache.get(&ctx, "a").scan::<String>().unwrap_err().kind(),
            ErrorKind::DeadlineExceeded
        );
        assert_eq!(counters.acquired(), 0);
    }

    #[test]
    fn test_canceled_context() {
        let (cache, counters) = mock_cache(vec![]);
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();

        let err = cache.increment(&ctx, "n", 1).unwrap_err();
        assert!(err.is_canceled());
        assert_eq!(counters.acquired(), 0);
    }

    #[test]
    fn test_direct_connection() {
        let (cache, counters) = mock_cache(vec![MockCmd::new(cmd("GET").arg("a"), Ok(bulk("1")))]);
        let ctx = Context::background();

        let mut conn = cache.conn(&ctx).unwrap();
        assert!(conn.err().is_none());
        let item = conn.get(&ctx, "a").unwrap();
        assert_eq!(conn.scan::<Vec<u8>>(&item).unwrap(), b"1".to_vec());
        assert_eq!(counters.open(), 1);
        conn.close();
        assert_eq!(counters.open(), 0);
    }
}

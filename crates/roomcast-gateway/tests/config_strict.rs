#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use roomcast_gateway::config::{self, BackendKind, SlowConsumerPolicy};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
auth:
  jwt_secret: "s3cret"
gateway:
  listen: "0.0.0.0:8081"
  pong_waitt_ms: 30000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
auth:
  jwt_secret: "s3cret"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.outbound_queue_capacity, 256);
    assert_eq!(cfg.gateway.max_message_bytes, 1024);
    assert_eq!(cfg.gateway.ping_period().as_millis(), 54_000);
    assert_eq!(cfg.gateway.slow_consumer, SlowConsumerPolicy::DropNewest);
    assert_eq!(cfg.auth.cookie_name, "access_token");
    assert_eq!(cfg.auth.query_param, "token");
    assert_eq!(cfg.broker.kind, BackendKind::Memory);
    assert_eq!(cfg.presence.key_prefix, "presence:room:");
}

#[test]
fn full_config_parses() {
    let ok = r#"
version: 1
gateway:
  listen: "127.0.0.1:9000"
  pong_wait_ms: 30000
  write_wait_ms: 5000
  outbound_queue_capacity: 32
  slow_consumer: disconnect
auth:
  jwt_secret: "s3cret"
  cookie_name: "sid"
broker:
  kind: redis
  redis_url: "redis://cache:6379"
presence:
  kind: redis
  redis_url: "redis://cache:6379"
  ttl_secs: 0
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.gateway.slow_consumer, SlowConsumerPolicy::Disconnect);
    assert_eq!(cfg.gateway.ping_period().as_millis(), 27_000);
    assert_eq!(cfg.broker.kind, BackendKind::Redis);
    assert_eq!(cfg.presence.ttl_secs, 0);
}

#[test]
fn missing_secret_is_rejected() {
    let bad = r#"
version: 1
auth: {}
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn unsupported_version() {
    let bad = r#"
version: 2
auth:
  jwt_secret: "s3cret"
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn out_of_range_values_are_rejected() {
    for gateway in [
        "pong_wait_ms: 500",
        "write_wait_ms: 0",
        "outbound_queue_capacity: 0",
        "max_message_bytes: 10",
        "register_buffer: 0",
    ] {
        let bad = format!("version: 1\nauth:\n  jwt_secret: s\ngateway:\n  {gateway}\n");
        let err = config::load_from_str(&bad).expect_err(gateway);
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST", "{gateway}");
    }
}

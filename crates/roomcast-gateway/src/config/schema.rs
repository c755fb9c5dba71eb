use std::time::Duration;

use serde::Deserialize;
use roomcast_core::error::{Result, RoomcastError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    pub auth: AuthSection,

    #[serde(default)]
    pub broker: BrokerSection,

    #[serde(default)]
    pub presence: PresenceSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RoomcastError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.auth.validate()?;
        if self.broker.kind == BackendKind::Redis && self.broker.redis_url.is_empty() {
            return Err(RoomcastError::BadRequest(
                "broker.redis_url is required for the redis broker".into(),
            ));
        }
        self.presence.validate()?;

        Ok(())
    }
}

/// What to do with a frame that does not fit a client's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlowConsumerPolicy {
    /// Drop the frame that did not fit; keep the connection.
    #[default]
    DropNewest,
    /// Tear the client down; it is expected to reconnect.
    Disconnect,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Peer read-timeout window; pings go out at 9/10 of it.
    #[serde(default = "default_pong_wait_ms")]
    pub pong_wait_ms: u64,

    #[serde(default = "default_write_wait_ms")]
    pub write_wait_ms: u64,

    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Capacity of the hub's register/subscribe channels.
    #[serde(default = "default_register_buffer")]
    pub register_buffer: usize,

    #[serde(default)]
    pub slow_consumer: SlowConsumerPolicy,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            pong_wait_ms: default_pong_wait_ms(),
            write_wait_ms: default_write_wait_ms(),
            max_message_bytes: default_max_message_bytes(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            register_buffer: default_register_buffer(),
            slow_consumer: SlowConsumerPolicy::default(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(10000..=600000).contains(&self.pong_wait_ms) {
            return Err(RoomcastError::BadRequest(
                "gateway.pong_wait_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.write_wait_ms == 0 || self.write_wait_ms > self.pong_wait_ms {
            return Err(RoomcastError::BadRequest(
                "gateway.write_wait_ms must be > 0 and not exceed pong_wait_ms".into(),
            ));
        }
        if self.max_message_bytes < 64 {
            return Err(RoomcastError::BadRequest(
                "gateway.max_message_bytes must be at least 64".into(),
            ));
        }
        if !(1..=65536).contains(&self.outbound_queue_capacity) {
            return Err(RoomcastError::BadRequest(
                "gateway.outbound_queue_capacity must be between 1 and 65536".into(),
            ));
        }
        if self.register_buffer == 0 {
            return Err(RoomcastError::BadRequest(
                "gateway.register_buffer must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8081".into()
}
fn default_pong_wait_ms() -> u64 {
    60000
}
fn default_write_wait_ms() -> u64 {
    10000
}
fn default_max_message_bytes() -> usize {
    1024
}
fn default_outbound_queue_capacity() -> usize {
    256
}
fn default_register_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    /// HS256 secret shared with the token issuer.
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    #[serde(default = "default_query_param")]
    pub query_param: String,
}

impl AuthSection {
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(RoomcastError::BadRequest("auth.jwt_secret must not be empty".into()));
        }
        if self.cookie_name.is_empty() || self.query_param.is_empty() {
            return Err(RoomcastError::BadRequest(
                "auth.cookie_name and auth.query_param must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_cookie_name() -> String {
    "access_token".into()
}
fn default_query_param() -> String {
    "token".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Redis,
    /// Process-local; single node and tests.
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerSection {
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            redis_url: default_redis_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceSection {
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Expiry refreshed on every add; 0 keeps keys forever.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

impl Default for PresenceSection {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            ttl_secs: default_ttl_secs(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl PresenceSection {
    pub fn validate(&self) -> Result<()> {
        if self.kind == BackendKind::Redis && self.redis_url.is_empty() {
            return Err(RoomcastError::BadRequest(
                "presence.redis_url is required for the redis presence store".into(),
            ));
        }
        if self.op_timeout_ms == 0 {
            return Err(RoomcastError::BadRequest(
                "presence.op_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".into()
}
fn default_key_prefix() -> String {
    "presence:room:".into()
}
fn default_ttl_secs() -> u64 {
    86400
}
fn default_op_timeout_ms() -> u64 {
    2000
}

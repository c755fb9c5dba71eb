//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use roomcast_core::error::{Result, RoomcastError};

pub use schema::{
    AuthSection, BackendKind, BrokerSection, GatewayConfig, GatewaySection, PresenceSection,
    SlowConsumerPolicy,
};

/// Config file used when `ROOMCAST_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "roomcast.yaml";

/// Load from `ROOMCAST_CONFIG` (or `roomcast.yaml`), applying env overrides.
pub fn load() -> Result<GatewayConfig> {
    let path = std::env::var("ROOMCAST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RoomcastError::Internal(format!("read config {path} failed: {e}")))?;
    let mut cfg = parse(&s)?;
    if let Ok(secret) = std::env::var("ROOMCAST_JWT_SECRET") {
        cfg.auth.jwt_secret = secret;
    }
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg = parse(s)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse(s: &str) -> Result<GatewayConfig> {
    serde_yaml::from_str(s).map_err(|e| RoomcastError::BadRequest(format!("invalid yaml: {e}")))
}

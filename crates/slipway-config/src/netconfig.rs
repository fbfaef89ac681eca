//! Host/port precedence resolution.
//!
//! The precedence chain is data: an ordered list of platform and
//! package-manager variable names, then the explicit configuration value,
//! then a final fallback variable, then the collaborator's existing setting,
//! then the hard-coded default. The resolver is a pure function over an
//! explicit environment snapshot so the chain is testable without touching
//! process state.

use serde_json::{Value, json};
use std::collections::HashMap;

/// The precedence chain for one network setting.
pub struct SettingSpec {
    pub primary_vars: &'static [&'static str],
    pub fallback_var: &'static str,
    pub default: Option<Value>,
}

pub fn port_spec() -> SettingSpec {
    SettingSpec {
        primary_vars: &[
            "npm_config_port",
            "OPENSHIFT_SLS_PORT",
            "OPENSHIFT_NODEJS_PORT",
            "VCAP_APP_PORT",
        ],
        fallback_var: "PORT",
        default: Some(json!(3000)),
    }
}

pub fn host_spec() -> SettingSpec {
    SettingSpec {
        primary_vars: &[
            "npm_config_host",
            "OPENSHIFT_SLS_IP",
            "OPENSHIFT_NODEJS_IP",
            "VCAP_APP_HOST",
        ],
        fallback_var: "HOST",
        default: None,
    }
}

/// Resolve one setting through the precedence chain.
pub fn resolve_setting(
    spec: &SettingSpec,
    env: &HashMap<String, String>,
    configured: Option<&Value>,
    existing: Option<Value>,
) -> Option<Value> {
    for var in spec.primary_vars {
        if let Some(raw) = env.get(*var) {
            return Some(coerce(raw));
        }
    }
    if let Some(value) = configured {
        if !value.is_null() {
            return Some(value.clone());
        }
    }
    if let Some(raw) = env.get(spec.fallback_var) {
        return Some(coerce(raw));
    }
    if existing.is_some() {
        return existing;
    }
    spec.default.clone()
}

/// Environment values are strings; ports want to be numbers when they can be.
fn coerce(raw: &str) -> Value {
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::auth::AuthenticationMetadata;
use crate::types::RouteKey;

/// Contents of `auth.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthJsonConfig {
    #[serde(default)]
    pub routes: BTreeMap<RouteKey, AuthenticationMetadata>,
}

/// Locate `auth.json`.
///
/// Order: `explicit`, `AUTH_CONFIG`, `$XDG_CONFIG_HOME/strategy-resolver/auth.json`,
/// `./auth.json`.
pub fn resolve_auth_json_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    resolve_path_with(explicit, |name: &str| env::var(name).ok())
}

fn resolve_path_with(
    explicit: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }

    if let Some(p) = lookup("AUTH_CONFIG") {
        return Ok(PathBuf::from(p));
    }

    if let Some(xdg) = lookup("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("strategy-resolver").join("auth.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("auth.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow::anyhow!(
        "Could not find auth.json (pass --config, set AUTH_CONFIG or create ./auth.json)"
    ))
}

/// Replace `${VAR}` with the variable's value. Unknown variables are left as written.
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, &|name: &str| env::var(name).ok())
}

fn expand_with(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Some(val) = lookup(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

/// Expand every string nested in `value`.
fn expand_value(value: Value, lookup: &impl Fn(&str) -> Option<String>) -> Value {
    match value {
        Value::String(s) => Value::String(expand_with(&s, lookup)),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| expand_value(v, lookup)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, expand_value(v, lookup)))
                .collect(),
        ),
        other => other,
    }
}

fn expand_routes(cfg: AuthJsonConfig, lookup: &impl Fn(&str) -> Option<String>) -> AuthJsonConfig {
    let routes = cfg
        .routes
        .into_iter()
        .map(|(key, mut meta)| {
            meta.options = expand_value(meta.options, lookup);
            (key, meta)
        })
        .collect();
    AuthJsonConfig { routes }
}

/// Parse `auth.json` from a string, expanding `${VAR}` in route options.
pub fn parse_auth_json(raw: &str) -> anyhow::Result<AuthJsonConfig> {
    let cfg: AuthJsonConfig = serde_json::from_str(raw)?;
    Ok(expand_routes(cfg, &|name: &str| env::var(name).ok()))
}

/// Load the route table from `path`.
pub fn load_routes(path: &Path) -> anyhow::Result<BTreeMap<RouteKey, AuthenticationMetadata>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg = parse_auth_json(&raw).with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(cfg.routes)
}

//! Stable request identifiers.

use std::fmt;

use alloy::primitives::Address;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Method name plus canonical JSON of the parameters.
///
/// Object keys are sorted, so parameter order never produces two
/// fingerprints for the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    method: String,
    key: String,
}

impl Fingerprint {
    pub fn new<P: Serialize + ?Sized>(method: &str, params: &P) -> Self {
        let encoded = match serde_json::to_value(params) {
            Ok(value) => canonical(value).to_string(),
            Err(e) => {
                tracing::warn!(method, error = %e, "Unserializable query parameters");
                format!("!{}", e)
            }
        };
        Self {
            method: method.to_string(),
            key: format!("{}:{}", method, encoded),
        }
    }

    /// Fingerprint for a read that depends on the connected wallet.
    pub fn for_account<P: Serialize + ?Sized>(
        method: &str,
        account: Option<Address>,
        chain_id: Option<u64>,
        params: &P,
    ) -> Self {
        let params = match serde_json::to_value(params) {
            Ok(value) => value,
            Err(_) => return Self::new(method, params),
        };
        Self::new(method, &json!({ "account": account, "chainId": chain_id, "params": params }))
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, canonical(v))).collect::<Map<_, _>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        other => other,
    }
}

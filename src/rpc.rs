//! JSON-RPC 2.0 front end. Transport-agnostic: [`handle`] maps one request string to one
//! response string.

use std::str::FromStr;

use bitcoin::bip32::Fingerprint;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::Ssm;
use crate::chain::Chain;
use crate::error::SsmError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const ENGINE_ERROR: i64 = -32000;

const INTERNAL_ERROR_RESPONSE: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"internal error"}}"#;

#[derive(Debug, Deserialize)]
struct Request {
    jsonrpc: String,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorObject>,
}

impl Response {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ErrorObject {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewMasterParams {
    chain: String,
    entropy: String,
    #[serde(default)]
    isbytes: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RestoreMasterParams {
    chain: String,
    #[serde(alias = "hdkey")]
    extended_key: String,
    #[serde(default, alias = "blindingkey")]
    blinding_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyPathParams {
    chain: String,
    fingerprint: String,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyParams {
    chain: String,
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SignTxParams {
    chain: String,
    tx: String,
    fingerprints: String,
    paths: String,
    values: String,
}

enum CallError {
    MethodNotFound(String),
    InvalidParams(String),
    Engine(SsmError),
}

impl From<SsmError> for CallError {
    fn from(e: SsmError) -> Self {
        CallError::Engine(e)
    }
}

fn params<T: DeserializeOwned>(value: Value) -> Result<T, CallError> {
    serde_json::from_value(value).map_err(|e| CallError::InvalidParams(e.to_string()))
}

fn chain(name: &str) -> Result<Chain, CallError> {
    Chain::from_str(name).map_err(|e| CallError::InvalidParams(e.to_string()))
}

fn fingerprint(hex: &str) -> Result<Fingerprint, CallError> {
    Fingerprint::from_str(hex)
        .map_err(|e| CallError::InvalidParams(format!("invalid fingerprint {hex:?}: {e}")))
}

fn dispatch(ssm: &Ssm, method: &str, raw: Value) -> Result<Value, CallError> {
    match method {
        "new_master" => {
            let p: NewMasterParams = params(raw)?;
            let chain = chain(&p.chain)?;
            let fingerprint = ssm.new_wallet(chain, &p.entropy, p.isbytes)?;
            Ok(json!({ "chain": chain, "fingerprint": fingerprint.to_string() }))
        }
        "restore_master" => {
            let p: RestoreMasterParams = params(raw)?;
            let chain = chain(&p.chain)?;
            let fingerprint =
                ssm.restore_wallet(chain, &p.extended_key, p.blinding_key.as_deref())?;
            Ok(json!({ "chain": chain, "fingerprint": fingerprint.to_string() }))
        }
        "new_address" => {
            let p: KeyPathParams = params(raw)?;
            let chain = chain(&p.chain)?;
            let derived = ssm.get_address(chain, fingerprint(&p.fingerprint)?, &p.path)?;
            let mut out = json!({
                "chain": chain,
                "address": derived.address,
                "pubkey": derived.pubkey.to_string(),
            });
            if let Some(key) = derived.blinding_key {
                out["blinding_key"] = Value::String(hex::encode(key.secret_bytes()));
            }
            Ok(out)
        }
        "get_xpub" => {
            let p: KeyParams = params(raw)?;
            let chain = chain(&p.chain)?;
            let xpub = ssm.get_xpub(chain, fingerprint(&p.fingerprint)?)?;
            Ok(json!({ "chain": chain, "xpub": xpub }))
        }
        "get_xprv" => {
            let p: KeyParams = params(raw)?;
            let chain = chain(&p.chain)?;
            let xprv = ssm.get_xprv(chain, fingerprint(&p.fingerprint)?)?;
            Ok(json!({ "chain": chain, "xprv": xprv }))
        }
        "sign_tx" => {
            let p: SignTxParams = params(raw)?;
            let chain = chain(&p.chain)?;
            let signed_tx = ssm.sign_tx(chain, &p.tx, &p.fingerprints, &p.paths, &p.values)?;
            Ok(json!({ "chain": chain, "signed_tx": signed_tx }))
        }
        other => Err(CallError::MethodNotFound(other.to_string())),
    }
}

/// Handles one JSON-RPC request.
pub fn handle(ssm: &Ssm, request: &str) -> String {
    let response = match serde_json::from_str::<Value>(request) {
        Err(e) => Response::err(Value::Null, PARSE_ERROR, e.to_string()),
        Ok(value) => match serde_json::from_value::<Request>(value) {
            Err(e) => Response::err(Value::Null, INVALID_REQUEST, e.to_string()),
            Ok(req) if req.jsonrpc != "2.0" => {
                Response::err(req.id, INVALID_REQUEST, "jsonrpc must be \"2.0\"")
            }
            Ok(req) => match dispatch(ssm, &req.method, req.params) {
                Ok(result) => Response::ok(req.id, result),
                Err(CallError::MethodNotFound(method)) => Response::err(
                    req.id,
                    METHOD_NOT_FOUND,
                    format!("method not found: {method}"),
                ),
                Err(CallError::InvalidParams(message)) => {
                    Response::err(req.id, INVALID_PARAMS, message)
                }
                Err(CallError::Engine(e)) => {
                    warn!(method = %req.method, error = %e, "request failed");
                    Response::err(req.id, ENGINE_ERROR, e.to_string())
                }
            },
        },
    };
    serde_json::to_string(&response).unwrap_or_else(|_| INTERNAL_ERROR_RESPONSE.to_string())
}

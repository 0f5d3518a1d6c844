//! JSON-RPC 2.0 envelopes exchanged with the daemon.

use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::error::{Error, Result};

pub const JSONRPC_VERSION: &str = "2.0";

/// The structure of a request. Used to serialize json into it.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Request {
    pub id: u32,
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Request {
    pub fn new(id: u32, method: impl Into<String>, params: Value) -> Self {
        Request {
            id,
            jsonrpc: Cow::Borrowed(JSONRPC_VERSION),
            method: method.into(),
            params,
        }
    }
}

/// A structured failure reported by the daemon.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// The structure of a response.
///
/// `result` keeps an explicit `null` as `Some(Value::Null)`, so a missing
/// `result` can be told apart from a null one.
#[derive(Debug, PartialEq, Clone)]
pub struct Response {
    pub id: u32,
    pub jsonrpc: Option<String>,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

impl Response {
    /// Check the envelope shape of a decoded value.
    pub fn from_value(value: Value) -> Result<Self> {
        let id = response_id(&value)?;
        let Value::Object(mut obj) = value else {
            return Err(Error::Protocol("response is not a JSON object".into()));
        };

        let jsonrpc = match obj.remove("jsonrpc") {
            None => None,
            Some(Value::String(v)) => Some(v),
            Some(other) => {
                return Err(Error::Protocol(format!(
                    "response {id}: 'jsonrpc' is not a string: {other}"
                )))
            }
        };

        let error = match obj.remove("error") {
            None | Some(Value::Null) => None,
            Some(e) => Some(serde_json::from_value::<RpcError>(e.clone()).map_err(|err| {
                Error::Protocol(format!("response {id}: malformed error object {e}: {err}"))
            })?),
        };

        let result = obj.remove("result");

        if result.is_none() && error.is_none() {
            return Err(Error::Protocol(format!(
                "response {id} carries neither 'result' nor 'error'"
            )));
        }

        Ok(Response {
            id,
            jsonrpc,
            result,
            error,
        })
    }

    /// The call outcome: the error object wins over any result.
    pub fn into_result(self) -> Result<Value> {
        match self {
            Response { error: Some(e), .. } => Err(Error::Rpc(e)),
            Response {
                result: Some(r), ..
            } => Ok(r),
            Response { id, .. } => Err(Error::Protocol(format!(
                "response {id} carries neither 'result' nor 'error'"
            ))),
        }
    }
}

/// Extract the correlation id of a decoded response value.
pub fn response_id(value: &Value) -> Result<u32> {
    let obj: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| Error::Protocol(format!("response is not a JSON object: {value}")))?;

    match obj.get("id") {
        None => Err(Error::Protocol(format!("response without 'id': {value}"))),
        Some(id) => id
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| Error::Protocol(format!("response 'id' is not a u32: {id}"))),
    }
}

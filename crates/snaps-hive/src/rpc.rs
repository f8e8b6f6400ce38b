use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use snaps_types::post::{Account, Post, PostKey};

use crate::HiveError;

pub const DEFAULT_NODES: &[&str] = &[
    "https://api.hive.blog",
    "https://api.deathwing.me",
    "https://api.openhive.network",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// JSON-RPC client over a list of fallback nodes.
///
/// The node that last answered is tried first on the next call.
pub struct HiveClient {
    http: Client,
    nodes: Vec<String>,
    preferred: AtomicUsize,
}

impl HiveClient {
    pub fn new(nodes: Vec<String>) -> Result<Self, HiveError> {
        if nodes.is_empty() {
            return Err(HiveError::NoNodes);
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            nodes,
            preferred: AtomicUsize::new(0),
        })
    }

    pub fn with_default_nodes() -> Result<Self, HiveError> {
        Self::new(DEFAULT_NODES.iter().map(|n| n.to_string()).collect())
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Node indices in the order the next call tries them.
    fn node_order(&self) -> Vec<usize> {
        let len = self.nodes.len();
        let start = self.preferred.load(Ordering::Relaxed) % len;
        (0..len).map(|offset| (start + offset) % len).collect()
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, HiveError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let mut last: Option<HiveError> = None;
        for idx in self.node_order() {
            let node = &self.nodes[idx];
            match self.call_node(node, &request).await {
                Ok(value) => {
                    self.preferred.store(idx, Ordering::Relaxed);
                    return Ok(serde_json::from_value(value)?);
                }
                Err(e) => {
                    warn!("Hive node {} failed for {}: {}", node, method, e);
                    last = Some(e);
                }
            }
        }

        Err(HiveError::AllNodesFailed {
            attempts: self.nodes.len(),
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn call_node(&self, node: &str, request: &RpcRequest<'_>) -> Result<Value, HiveError> {
        debug!("{} -> {}", request.method, node);
        let response: RpcResponse = self
            .http
            .post(node)
            .json(request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        unwrap_response(response)
    }

    /// `None` when the post does not exist.
    pub async fn get_content(&self, key: &PostKey) -> Result<Option<Post>, HiveError> {
        let post: Post = self
            .call(
                "condenser_api.get_content",
                serde_json::json!([key.author, key.permlink]),
            )
            .await?;
        Ok((!post.is_empty()).then_some(post))
    }

    pub async fn get_accounts(&self, names: &[String]) -> Result<Vec<Account>, HiveError> {
        if names.is_empty() {
            return Ok(vec![]);
        }
        self.call("condenser_api.get_accounts", serde_json::json!([names]))
            .await
    }
}

fn unwrap_response(response: RpcResponse) -> Result<Value, HiveError> {
    if let Some(err) = response.error {
        return Err(HiveError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(nodes: &[&str]) -> HiveClient {
        HiveClient::new(nodes.iter().map(|n| n.to_string()).collect()).unwrap()
    }

    #[test]
    fn empty_node_list_is_rejected() {
        assert!(matches!(HiveClient::new(vec![]), Err(HiveError::NoNodes)));
    }

    #[test]
    fn node_order_starts_at_last_good_node() {
        let c = client(&["a", "b", "c"]);
        assert_eq!(c.node_order(), vec![0, 1, 2]);

        c.preferred.store(2, Ordering::Relaxed);
        assert_eq!(c.node_order(), vec![2, 0, 1]);
    }

    #[test]
    fn rpc_error_body_becomes_error() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid parameters"},"id":1}"#,
        )
        .unwrap();
        match unwrap_response(response) {
            Err(HiveError::Rpc { code, message }) => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Invalid parameters");
            }
            other => panic!("expected rpc error, got {:?}", other),
        }
    }

    #[test]
    fn result_is_extracted() {
        let response: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","result":{"author":"alice","permlink":"snap-1"},"id":1}"#,
        )
        .unwrap();
        let post: Post = serde_json::from_value(unwrap_response(response).unwrap()).unwrap();
        assert_eq!(post.key(), PostKey::new("alice", "snap-1"));
    }

    #[tokio::test]
    async fn unreachable_nodes_fail_over_then_report() {
        let c = client(&["http://127.0.0.1:9", "http://127.0.0.1:9"]);
        let result: Result<Value, _> = c.call("condenser_api.get_config", serde_json::json!([])).await;
        match result {
            Err(HiveError::AllNodesFailed { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected AllNodesFailed, got {:?}", other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HiveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No Hive nodes configured")]
    NoNodes,

    #[error("All {attempts} Hive nodes failed, last error: {last}")]
    AllNodesFailed { attempts: usize, last: String },
}

//! Error taxonomy for panel operations.
//!
//! Every variant is scoped to one panel or one node; none of them is fatal.

use thiserror::Error;
use url::Url;

use crate::model::NodeId;

#[derive(Debug, Error)]
pub enum PanelError {
    /// The host returned nothing for the query. Informational; no panel opens.
    #[error("{0}")]
    NoResult(String),

    /// A message referenced an id the session no longer (or never) knew.
    #[error("unknown or disposed node: {0}")]
    StaleNode(NodeId),

    /// The host query itself raised an error.
    #[error("host query failed: {0}")]
    HostQueryFailed(String),

    /// A line of source could not be read for display.
    #[error("text unavailable for {uri} line {line}")]
    TextUnavailable { uri: Url, line: u32 },
}

impl PanelError {
    pub fn host(err: anyhow::Error) -> Self {
        Self::HostQueryFailed(format!("{err:#}"))
    }
}

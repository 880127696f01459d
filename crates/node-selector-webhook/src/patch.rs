use json_patch::{jsonptr::PointerBuf, Patch, PatchOperation, ReplaceOperation};
use thiserror::Error;

use crate::labels::LabelSet;

/// JSON pointer to the node selector of a Pod
pub const NODE_SELECTOR_PATH: &str = "/spec/nodeSelector";

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("invalid patch path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("cannot serialize patch: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Build the JSON Patch that replaces the whole node selector of a Pod with
/// `selector`. Keys of the existing node selector that are not part of
/// `selector` are dropped.
pub fn build_patch(selector: &LabelSet) -> Result<Vec<u8>, PatchError> {
    let path = PointerBuf::parse(NODE_SELECTOR_PATH).map_err(|e| PatchError::InvalidPath {
        path: NODE_SELECTOR_PATH.to_owned(),
        reason: e.to_string(),
    })?;

    let patch = Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path,
        value: serde_json::to_value(selector)?,
    })]);

    Ok(serde_json::to_vec(&patch)?)
}

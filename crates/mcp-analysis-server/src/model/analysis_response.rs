use serde::{Deserialize, Serialize};

/// `(server_idx, tool_idx)` of the tool that triggered an issue. Serialized as
/// a two-element array.
#[derive(Clone, Copy, Deserialize, Debug, Serialize, PartialEq, Eq, Hash)]
pub struct IssueReference(pub usize, pub usize);

#[derive(Clone, Deserialize, Debug, Serialize, PartialEq, Eq)]
pub struct Issue {
    pub code: String,
    pub message: String,
    pub reference: Option<IssueReference>,
}

#[derive(Clone, Deserialize, Debug, Serialize, PartialEq, Eq, Default)]
pub struct AnalysisServerResponse {
    pub issues: Vec<Issue>,
}

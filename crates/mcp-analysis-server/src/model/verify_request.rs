use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::analysis_response::IssueReference;

/// A tool exposed by an MCP server. Only the description is inspected.
#[derive(Clone, Deserialize, Debug, Serialize, PartialEq)]
pub struct Tool {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl Tool {
    /// The description to classify. Absent descriptions are treated as empty.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Deserialize, Debug, Serialize, PartialEq)]
pub struct ServerSignature {
    /// Server metadata, passed through unexamined.
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

/// The batch sent by the scanner. A `None` entry is a server whose signature
/// could not be captured; it still occupies its index.
#[derive(Clone, Deserialize, Debug, Serialize, PartialEq, Default)]
#[serde(transparent)]
pub struct VerifyServerRequest(pub Vec<Option<ServerSignature>>);

impl VerifyServerRequest {
    /// Iterates over every tool with a non-empty description, along with its
    /// position in the request.
    pub fn described_tools(&self) -> impl Iterator<Item = (IssueReference, &str)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(server_idx, server)| server.as_ref().map(|s| (server_idx, s)))
            .flat_map(|(server_idx, server)| {
                server
                    .tools
                    .iter()
                    .enumerate()
                    .map(move |(tool_idx, tool)| {
                        (IssueReference(server_idx, tool_idx), tool.description_text())
                    })
            })
            .filter(|(_, description)| !description.is_empty())
    }
}

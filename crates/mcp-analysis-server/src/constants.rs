pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");
// revision injected at build time by the release pipeline
pub const VERSION: &str = match option_env!("GITHUB_SHA") {
    Some(sha) => sha,
    None => "development",
};

// path appended to the configured backend address
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_PORT: u16 = 8128;
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 1;
// environment variable holding an optional bearer token for the backend
pub const ENV_LLM_API_KEY: &str = "MCP_ANALYSIS_LLM_API_KEY";

pub const SERVER_HEADER_SHUTDOWN_ENABLED: &str = "X-mcp-analysis-server-shutdown-enabled";
pub const SERVER_HEADER_KEEPALIVE_ENABLED: &str = "X-mcp-analysis-server-keepalive-enabled";
pub const SERVER_HEADER_SERVER_VERSION: &str = "X-mcp-analysis-server-version";
pub const SERVER_HEADER_SERVER_REVISION: &str = "X-mcp-analysis-server-revision";

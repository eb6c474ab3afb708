pub mod executors;
pub mod paths;
pub mod protocol;
pub mod tools;

pub use protocol::{ToolCall, ToolCallResult, ToolDescriptor};
pub use tools::{
    estimate_tokens, normalize_tool_name, ToolContext, ToolExecutor, ToolInvocationResult,
    ToolPayload, ToolRegistry,
};

/// Canonical tool names
pub mod names {
    pub const GET_ENTITIES: &str = "Get Entities";
    pub const GET_CONTROLLERS: &str = "Get Controllers";
    pub const GET_ROUTES: &str = "Get Routes";
    pub const GET_FILE_CONTENT: &str = "Get File Content";
    pub const SEARCH_CODE: &str = "Search Code";
    pub const READ_DIRECTORY: &str = "Read Directory";
    pub const GET_PROJECT_STRUCTURE: &str = "Get Project Structure";
    pub const GET_USER_ROLES: &str = "Get User Roles";
    pub const GET_CONTEXTUAL_CODE_ANALYSIS: &str = "Get Contextual Code Analysis";
}

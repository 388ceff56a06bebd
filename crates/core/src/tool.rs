//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world. The
//! reasoning loop speaks a text protocol, so a tool takes the raw
//! `Action Input:` string and answers with the raw observation text.

use async_trait::async_trait;
use std::collections::BTreeMap;
use crate::error::ToolError;

/// The core Tool trait.
///
/// Each capability (web search, ...) implements this trait and is registered
/// in the [`ToolRegistry`] the loop dispatches through.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "google_search").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Run the tool on a text input and return the observation.
    async fn invoke(&self, input: &str) -> std::result::Result<String, ToolError>;
}

/// An explicit mapping from tool name to capability.
///
/// Built once at start-up and shared read-only with the loop. Iteration is
/// ordered by name so the rendered prompt is stable across runs.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// One `name: description` line per tool.
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        async fn invoke(&self, input: &str) -> std::result::Result<String, ToolError> {
            Ok(input.to_string())
        }
    }

    struct ClockTool;

    #[async_trait]
    impl Tool for ClockTool {
        fn name(&self) -> &str { "clock" }
        fn description(&self) -> &str { "Tells the time" }
        async fn invoke(&self, _input: &str) -> std::result::Result<String, ToolError> {
            Ok("noon".into())
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_describe_is_name_ordered() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(ClockTool));
        assert_eq!(registry.names(), vec!["clock", "echo"]);
        assert_eq!(
            registry.describe(),
            "clock: Tells the time\necho: Echoes back the input"
        );
    }

    #[tokio::test]
    async fn registered_tool_is_invoked_through_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let tool = registry.get("echo").unwrap();
        assert_eq!(tool.invoke("hello world").await.unwrap(), "hello world");
    }

    #[test]
    fn registering_same_name_replaces() {
        struct LoudEcho;

        #[async_trait]
        impl Tool for LoudEcho {
            fn name(&self) -> &str { "echo" }
            fn description(&self) -> &str { "Echoes loudly" }
            async fn invoke(&self, input: &str) -> std::result::Result<String, ToolError> {
                Ok(input.to_uppercase())
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(LoudEcho));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.describe(), "echo: Echoes loudly");
    }
}

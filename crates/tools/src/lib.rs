//! Tool implementations for Sagecord.
//!
//! The agent's registry is fixed at start-up: web search is the only
//! capability it gets.

pub mod google_search;

use sagecord_config::AppConfig;
use sagecord_core::tool::ToolRegistry;

pub use google_search::GoogleSearchTool;

/// Create the registry the agent runs with.
pub fn default_registry(config: &AppConfig) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(
        GoogleSearchTool::new(&config.google_api_key, &config.google_cse_id)
            .with_num_results(config.search_results),
    ));
    registry
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use tl_domain::ctx::Cancel;
use tl_domain::error::{Error, Result};
use tl_domain::tool::ToolDefinition;

use crate::traits::Tool;

/// Name-keyed registry of tool implementations.
///
/// Registration fails on a duplicate name; dispatch fails with
/// `ToolUnknown` when no tool with that name is registered.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        let mut tools = self.tools.write();
        if tools.contains_key(&name) {
            return Err(Error::InvalidArgument(format!("duplicate tool name: {name}")));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub async fn execute(&self, name: &str, params: serde_json::Value, cancel: &dyn Cancel) -> Result<String> {
        let tool = {
            let tools = self.tools.read();
            tools.get(name).cloned()
        };
        match tool {
            Some(tool) => tool.invoke(params, cancel).await,
            None => Err(Error::ToolUnknown(name.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Tool definitions for every registered tool, for context building.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.read().values().map(|t| t.definition()).collect()
    }

    /// Names of every registered tool other than `exclude`, for
    /// tool-failure report suggestions.
    pub fn names_excluding(&self, exclude: &str) -> Vec<String> {
        self.tools
            .read()
            .keys()
            .filter(|n| n.as_str() != exclude)
            .cloned()
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

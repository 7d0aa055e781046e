//! Tool registry and the built-in tool definitions.

use crate::protocol::ToolDefinition;
use serde_json::json;
use std::collections::HashMap;

/// The set of tools the server advertises, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any earlier definition under the same name.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool definitions, sorted by name for a stable `tools/list`.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The gateway's built-in tools.
pub fn builtin_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "list_databases".to_string(),
            description: Some("List databases, separating system databases out".to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "list_tables".to_string(),
            description: Some("List tables in a database (or the current one)".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "database": {"type": "string", "description": "Database or schema name (optional)"}
                }
            }),
        },
        ToolDefinition {
            name: "describe_table".to_string(),
            description: Some("Describe a table's columns and indexes".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table": {"type": "string", "description": "Table name"},
                    "database": {"type": "string", "description": "Database or schema name (optional)"}
                },
                "required": ["table"]
            }),
        },
        ToolDefinition {
            name: "server_status".to_string(),
            description: Some("Backend version, pool usage, and a connectivity check".to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "select".to_string(),
            description: Some("Run a SELECT query with security validation".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SELECT statement to run"},
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 10000,
                        "description": "Row limit appended when the query has none (optional)"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "insert".to_string(),
            description: Some("Insert one row, with values bound as parameters".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table": {"type": "string", "description": "Table name"},
                    "data": {"type": "object", "description": "Column/value pairs to insert"},
                    "database": {"type": "string", "description": "Database or schema name (optional)"}
                },
                "required": ["table", "data"]
            }),
        },
        ToolDefinition {
            name: "update".to_string(),
            description: Some("Update rows matching WHERE conditions".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table": {"type": "string", "description": "Table name"},
                    "data": {"type": "object", "description": "Column/value pairs to set"},
                    "conditions": {"type": "object", "description": "WHERE column/value equality conditions"},
                    "database": {"type": "string", "description": "Database or schema name (optional)"}
                },
                "required": ["table", "data", "conditions"]
            }),
        },
        ToolDefinition {
            name: "delete".to_string(),
            description: Some("Delete rows matching WHERE conditions".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table": {"type": "string", "description": "Table name"},
                    "conditions": {"type": "object", "description": "WHERE column/value equality conditions"},
                    "database": {"type": "string", "description": "Database or schema name (optional)"},
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 1000,
                        "description": "Cap on deleted rows (MySQL only, optional)"
                    }
                },
                "required": ["table", "conditions"]
            }),
        },
        ToolDefinition {
            name: "execute".to_string(),
            description: Some("Run an arbitrary statement; the operation kind is classified and validated".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL statement to run"},
                    "params": {"type": "array", "description": "Positional bind parameters (optional)"}
                },
                "required": ["query"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_get() {
        let mut registry = ToolRegistry::new();
        for tool in builtin_tools() {
            registry.register(tool);
        }
        assert!(registry.get("select").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.contains("describe_table"));
    }

    #[test]
    fn builtin_tool_set_is_complete() {
        let mut registry = ToolRegistry::new();
        for tool in builtin_tools() {
            registry.register(tool);
        }
        assert_eq!(
            registry.names(),
            vec![
                "delete",
                "describe_table",
                "execute",
                "insert",
                "list_databases",
                "list_tables",
                "select",
                "server_status",
                "update",
            ]
        );
    }

    #[test]
    fn schemas_declare_required_fields() {
        for tool in builtin_tools() {
            let schema = &tool.input_schema;
            assert_eq!(schema["type"], "object", "{}", tool.name);
        }
    }
}

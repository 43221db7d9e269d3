use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One tool-provider as declared under `mcp.servers`.
///
/// The transport fields are kept as written; they are interpreted when the
/// connection is opened so that an unsupported `type` surfaces as a
/// connection failure of the owning character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub name: String,
    pub kind: String,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub url: Option<String>,
    pub env: HashMap<String, String>,
    /// Allowed tool names; `None` exposes every tool of the server.
    pub tools: Option<BTreeSet<String>>,
}

impl ServerDescriptor {
    pub fn process(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: "stdio".to_string(),
            command: Some(command.into()),
            args,
            url: None,
            env: HashMap::new(),
            tools: None,
        }
    }

    pub fn stream(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "sse".to_string(),
            command: None,
            args: Vec::new(),
            url: Some(url.into()),
            env: HashMap::new(),
            tools: None,
        }
    }

    pub fn with_whitelist<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Whitelist check applied to every tool the server declares.
    pub fn allows(&self, tool: &str) -> bool {
        match &self.tools {
            None => true,
            Some(allowed) => allowed.contains(tool),
        }
    }

    pub(crate) fn from_raw(raw: RawServer, index: usize) -> Self {
        let name = raw
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                let target = raw.command.as_deref().or(raw.url.as_deref()).unwrap_or("server");
                format!("{}#{index}", target)
            });
        Self {
            name,
            kind: raw.kind,
            command: raw.command,
            args: raw.args,
            url: raw.url,
            env: raw.env,
            tools: raw.tools.map(RawWhitelist::into_set),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawServer {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    env: HashMap<String, String>,
    #[serde(default)]
    tools: Option<RawWhitelist>,
}

/// `tools` may be a list of names or a map of `name: <truthy>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawWhitelist {
    Names(Vec<String>),
    Flags(BTreeMap<String, Value>),
}

impl RawWhitelist {
    fn into_set(self) -> BTreeSet<String> {
        match self {
            RawWhitelist::Names(names) => names.into_iter().collect(),
            RawWhitelist::Flags(flags) => flags
                .into_iter()
                .filter(|(_, flag)| is_truthy(flag))
                .map(|(name, _)| name)
                .collect(),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> ServerDescriptor {
        let raw: RawServer = serde_json::from_value(value).expect("raw server");
        ServerDescriptor::from_raw(raw, 0)
    }

    #[test]
    fn missing_whitelist_allows_everything() {
        let server = parse(json!({"type": "stdio", "command": "npx", "args": ["srv"]}));
        assert!(server.tools.is_none());
        assert!(server.allows("anything"));
        assert_eq!(server.name, "npx#0");
    }

    #[test]
    fn flag_map_keeps_truthy_entries_only() {
        let server = parse(json!({
            "type": "stdio",
            "command": "srv",
            "tools": {"search": true, "delete": false, "read": {}}
        }));
        assert!(server.allows("search"));
        assert!(server.allows("read"));
        assert!(!server.allows("delete"));
    }

    #[test]
    fn empty_whitelist_blocks_everything() {
        let server = parse(json!({"type": "sse", "url": "http://x/sse", "tools": []}));
        assert!(!server.allows("search"));
        assert_eq!(server.name, "http://x/sse#0");
    }
}

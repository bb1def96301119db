use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE_TITLE: &str = "Source";
pub const DEFAULT_SOURCE_URI: &str = "#";

/// Normalized answer for one product query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleResult {
    pub product_name: String,
    pub summary: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: Option<String>, uri: Option<String>) -> Self {
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
            uri: uri
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
        }
    }

    /// False for the placeholder uri.
    pub fn is_navigable(&self) -> bool {
        self.uri != DEFAULT_SOURCE_URI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_defaults_missing_fields() {
        let source = Source::new(None, Some(String::new()));
        assert_eq!(source.title, "Source");
        assert_eq!(source.uri, "#");
        assert!(!source.is_navigable());
    }

    #[test]
    fn result_serializes_camel_case() {
        let result = LifecycleResult {
            product_name: "Java 8".into(),
            summary: "text".into(),
            sources: vec![Source::new(Some("Oracle".into()), Some("https://o".into()))],
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["productName"], "Java 8");
        assert_eq!(value["sources"][0]["uri"], "https://o");
    }
}

//! Output formatting shared by the command line tools

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Pretty table with borders (default)
    #[default]
    Table,
    /// Markdown table format
    Markdown,
    /// Compact JSON on a single line
    Json,
    /// Pretty-printed JSON with indentation
    JsonPretty,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table | Self::Markdown)
    }

    /// Get a list of all format names for help text
    pub fn all_names() -> &'static [&'static str] {
        &["table", "markdown", "json", "json-pretty"]
    }

    /// Serialize a value for one of the JSON formats
    ///
    /// Table formats fall back to pretty JSON; callers that can render a
    /// table should check [`is_table`](Self::is_table) first.
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            Self::Json => serde_json::to_string(value),
            _ => serde_json::to_string_pretty(value),
        }
    }

    /// Render rows as a rounded or markdown table
    #[cfg(feature = "display")]
    pub fn to_table<T, I>(&self, rows: I) -> String
    where
        T: tabled::Tabled,
        I: IntoIterator<Item = T>,
    {
        use tabled::settings::Style;
        use tabled::Table;

        let mut table = Table::new(rows);
        match self {
            Self::Markdown => table.with(Style::markdown()),
            _ => table.with(Style::rounded()),
        };
        table.to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
            Self::JsonPretty => write!(f, "json-pretty"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "json-pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            _ => Err(format!(
                "Unknown output format '{}'. Valid formats: {}",
                s,
                Self::all_names().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(
            OutputFormat::from_str("table").unwrap(),
            OutputFormat::Table
        );
        assert_eq!(OutputFormat::from_str("MD").unwrap(), OutputFormat::Markdown);
        assert_eq!(OutputFormat::from_str("json").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("json-pretty").unwrap(),
            OutputFormat::JsonPretty
        );
        let err = OutputFormat::from_str("psv").unwrap_err();
        assert!(err.contains("json-pretty"));
    }

    #[test]
    fn test_output_format_display() {
        for name in OutputFormat::all_names() {
            let format: OutputFormat = name.parse().unwrap();
            assert_eq!(&format.to_string(), name);
        }
    }

    #[test]
    fn test_table_and_json_formats_partition() {
        for name in OutputFormat::all_names() {
            let format: OutputFormat = name.parse().unwrap();
            assert_ne!(format.is_table(), format.is_json(), "{}", name);
        }
        assert!(OutputFormat::Markdown.is_table());
        assert!(!OutputFormat::JsonPretty.is_table());
    }

    #[test]
    fn test_to_json() {
        let value = serde_json::json!({"state": "connected"});
        assert_eq!(
            OutputFormat::Json.to_json(&value).unwrap(),
            r#"{"state":"connected"}"#
        );
        assert!(OutputFormat::JsonPretty
            .to_json(&value)
            .unwrap()
            .contains('\n'));
    }

    #[cfg(feature = "display")]
    #[test]
    fn test_to_table() {
        #[derive(tabled::Tabled)]
        struct Row {
            key: &'static str,
            database: &'static str,
        }

        let rows = || vec![Row { key: "apo", database: "apodb" }];
        let markdown = OutputFormat::Markdown.to_table(rows());
        assert!(markdown.contains("| apo"));
        assert!(OutputFormat::Table.to_table(rows()).contains("apodb"));
    }
}

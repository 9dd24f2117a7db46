//! Processing intents: what the workflow should do with the document.
//!
//! The menu is caller-supplied data. The library ships a default menu for
//! meeting-minutes workflows, but a deployment can load its own from a JSON
//! array of `{value, label, execution_option}` objects. The
//! `execution_option` string is sent to the engine verbatim.

use crate::error::DocflowError;
use serde::{Deserialize, Serialize};

/// One entry of the intent menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingIntent {
    /// Stable key used to select the intent (e.g. `summary`).
    pub value: String,
    /// Human-readable label for menus.
    pub label: String,
    /// Option string the workflow branches on.
    pub execution_option: String,
}

impl ProcessingIntent {
    pub fn new(
        value: impl Into<String>,
        label: impl Into<String>,
        execution_option: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            execution_option: execution_option.into(),
        }
    }
}

/// The closed set of intents a user can pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IntentMenu {
    intents: Vec<ProcessingIntent>,
}

impl Default for IntentMenu {
    fn default() -> Self {
        Self {
            intents: vec![
                ProcessingIntent::new("summary", "Summary", "summary"),
                ProcessingIntent::new("time_series", "Timeline", "time_series"),
                ProcessingIntent::new("action_items", "Action items", "action_items"),
                ProcessingIntent::new("decision_points", "Decisions", "decision_points"),
            ],
        }
    }
}

impl IntentMenu {
    /// Build a menu, rejecting empty menus, blank fields and duplicate values.
    pub fn new(intents: Vec<ProcessingIntent>) -> Result<Self, DocflowError> {
        if intents.is_empty() {
            return Err(DocflowError::InvalidConfig(
                "intent menu must contain at least one intent".into(),
            ));
        }
        for (i, intent) in intents.iter().enumerate() {
            if intent.value.trim().is_empty() || intent.execution_option.trim().is_empty() {
                return Err(DocflowError::InvalidConfig(format!(
                    "intent #{} has an empty value or execution_option",
                    i + 1
                )));
            }
            if intents[..i].iter().any(|other| other.value == intent.value) {
                return Err(DocflowError::InvalidConfig(format!(
                    "duplicate intent value '{}'",
                    intent.value
                )));
            }
        }
        Ok(Self { intents })
    }

    /// Parse a menu from a JSON array.
    pub fn from_json_str(json: &str) -> Result<Self, DocflowError> {
        let intents: Vec<ProcessingIntent> = serde_json::from_str(json)
            .map_err(|e| DocflowError::InvalidConfig(format!("intent menu: {e}")))?;
        Self::new(intents)
    }

    /// Look up an intent by its `value`. Idempotent and side-effect free.
    pub fn find(&self, value: &str) -> Option<&ProcessingIntent> {
        self.intents.iter().find(|i| i.value == value)
    }

    /// Like [`IntentMenu::find`], but an unknown value is an error listing the
    /// available ones.
    pub fn select(&self, value: &str) -> Result<&ProcessingIntent, DocflowError> {
        self.find(value).ok_or_else(|| DocflowError::UnknownIntent {
            value: value.to_string(),
            available: self
                .intents
                .iter()
                .map(|i| i.value.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// The first intent, used when the caller does not pick one.
    pub fn first(&self) -> &ProcessingIntent {
        // `new` and `default` both guarantee a non-empty menu.
        &self.intents[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessingIntent> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_menu_has_summary_first() {
        let menu = IntentMenu::default();
        assert_eq!(menu.first().value, "summary");
        assert_eq!(menu.len(), 4);
        assert_eq!(menu.find("action_items").unwrap().execution_option, "action_items");
    }

    #[test]
    fn select_is_idempotent() {
        let menu = IntentMenu::default();
        let a = menu.select("time_series").unwrap().clone();
        let b = menu.select("time_series").unwrap().clone();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_intent_lists_available() {
        let menu = IntentMenu::default();
        let err = menu.select("translate").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("translate"));
        assert!(msg.contains("summary, time_series"), "got: {msg}");
    }

    #[test]
    fn parses_json_menu() {
        let menu = IntentMenu::from_json_str(
            r#"[
                {"value": "summary", "label": "要約", "execution_option": "要約"},
                {"value": "todo", "label": "ToDo", "execution_option": "action_items"}
            ]"#,
        )
        .unwrap();
        assert_eq!(menu.select("summary").unwrap().execution_option, "要約");
        assert_eq!(menu.len(), 2);
    }

    #[test]
    fn rejects_empty_and_duplicate_menus() {
        assert!(IntentMenu::from_json_str("[]").is_err());
        assert!(IntentMenu::new(vec![
            ProcessingIntent::new("a", "A", "a"),
            ProcessingIntent::new("a", "A again", "b"),
        ])
        .is_err());
        assert!(IntentMenu::new(vec![ProcessingIntent::new("a", "A", " ")]).is_err());
        assert!(IntentMenu::from_json_str("{not json").is_err());
    }

    #[test]
    fn menu_serialises_as_array() {
        let json = serde_json::to_value(IntentMenu::default()).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["value"], "summary");
    }
}

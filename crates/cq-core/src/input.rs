//! User input values bound to conditions and actions

use serde::{Deserialize, Serialize};

/// A named value handed to a condition or action at configuration time
///
/// Several values may share a `unique_id`; the order in which they were
/// configured is preserved and significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInputValue {
    /// Id of the declared input this value was provided for
    pub unique_id: String,

    /// The value itself
    pub value: serde_json::Value,
}

impl UserInputValue {
    /// Create a new input value
    pub fn new(unique_id: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            unique_id: unique_id.into(),
            value: value.into(),
        }
    }
}

/// Find the value of the first input with the given id
///
/// Later inputs sharing the id are ignored.
pub fn first_value<'a>(inputs: &'a [UserInputValue], unique_id: &str) -> Option<&'a serde_json::Value> {
    inputs
        .iter()
        .find(|input| input.unique_id == unique_id)
        .map(|input| &input.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_value_wins() {
        let inputs = vec![
            UserInputValue::new("input", 1),
            UserInputValue::new("other", 2),
            UserInputValue::new("input", 3),
        ];

        assert_eq!(first_value(&inputs, "input"), Some(&json!(1)));
        assert_eq!(first_value(&inputs, "other"), Some(&json!(2)));
        assert_eq!(first_value(&inputs, "missing"), None);
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = UserInputValue::new("brightness", 80);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, json!({"uniqueId": "brightness", "value": 80}));
    }
}

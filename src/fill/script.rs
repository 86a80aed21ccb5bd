use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A fill script as returned by the credential-selection surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillScript {
    #[serde(rename = "script", default)]
    pub operations: Vec<Operation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: FillProperties,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: FillOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autosubmit: Option<Autosubmit>,
    /// URL the login was saved on.
    #[serde(rename = "savedURL", default, skip_serializing_if = "Option::is_none")]
    pub saved_url: Option<String>,
    #[serde(rename = "fillContextIdentifier", default, skip_serializing_if = "Option::is_none")]
    pub fill_context_identifier: Option<String>,
}

impl FillScript {
    /// Parse a JSON payload. `null` and anything that is not a script object
    /// are reported as [`Error::MalformedScript`].
    pub fn parse(payload: &str) -> Result<Self> {
        let script: Option<FillScript> =
            serde_json::from_str(payload).map_err(Error::MalformedScript)?;
        script.ok_or_else(|| {
            Error::MalformedScript(<serde_json::Error as serde::de::Error>::custom(
                "fill script is null",
            ))
        })
    }

    /// Inter-operation delay requested by the script, if any.
    pub fn delay_between_operations(&self) -> Option<Duration> {
        self.properties
            .delay_between_operations
            .and_then(millis_to_duration)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillProperties {
    /// Milliseconds; zero or absent keeps the engine default.
    pub delay_between_operations: Option<f64>,
    pub allow_clicky_autosubmit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    #[serde(alias = "animateOnFill")]
    pub animate: bool,
    #[serde(rename = "markFilling", alias = "markFormAsFilled")]
    pub mark_filling: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            animate: true,
            mark_filling: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autosubmit {
    /// Field whose form gets submitted once filling is done.
    #[serde(rename = "focusOpid")]
    pub focus_fingerprint: Option<String>,
}

/// One step of a fill script.
///
/// Entries with an unknown name or unusable parameters still parse, as
/// [`Operation::Unsupported`], and are skipped when the script runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOperation", into = "RawOperation")]
pub enum Operation {
    FillByFingerprint { fingerprint: String, value: String },
    FillByQuery { selector: String, value: String },
    ClickByFingerprint { fingerprint: String },
    ClickByQuery { selector: String },
    TouchAllFields,
    SetValueByQuery { selector: String, value: String },
    Delay(Duration),
    Unsupported { operation: String, parameters: Vec<Value> },
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::FillByFingerprint { .. } => "fill_by_opid",
            Operation::FillByQuery { .. } => "fill_by_query",
            Operation::ClickByFingerprint { .. } => "click_on_opid",
            Operation::ClickByQuery { .. } => "click_on_query",
            Operation::TouchAllFields => "touch_all_fields",
            Operation::SetValueByQuery { .. } => "simple_set_value_by_query",
            Operation::Delay(_) => "delay",
            Operation::Unsupported { operation, .. } => operation,
        }
    }
}

/// Wire shape: `{"operation": "...", "parameters": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawOperation {
    #[serde(default)]
    operation: String,
    #[serde(default)]
    parameters: Vec<Value>,
}

impl From<RawOperation> for Operation {
    fn from(raw: RawOperation) -> Self {
        let text = |index: usize| raw.parameters.get(index).and_then(parameter_text);
        let parsed = match raw.operation.as_str() {
            "fill_by_opid" | "fillByFingerprint" => text(0)
                .zip(text(1))
                .map(|(fingerprint, value)| Operation::FillByFingerprint { fingerprint, value }),
            "fill_by_query" | "fillByQuery" => text(0)
                .zip(text(1))
                .map(|(selector, value)| Operation::FillByQuery { selector, value }),
            "click_on_opid" | "clickByFingerprint" => {
                text(0).map(|fingerprint| Operation::ClickByFingerprint { fingerprint })
            }
            "click_on_query" | "clickByQuery" => {
                text(0).map(|selector| Operation::ClickByQuery { selector })
            }
            "touch_all_fields" | "touchAllFields" => Some(Operation::TouchAllFields),
            "simple_set_value_by_query" | "setValueByQuery" => text(0)
                .zip(text(1))
                .map(|(selector, value)| Operation::SetValueByQuery { selector, value }),
            "delay" => raw
                .parameters
                .first()
                .and_then(parameter_millis)
                .map(Operation::Delay),
            _ => None,
        };
        parsed.unwrap_or(Operation::Unsupported {
            operation: raw.operation,
            parameters: raw.parameters,
        })
    }
}

impl From<Operation> for RawOperation {
    fn from(operation: Operation) -> Self {
        let name = operation.name().to_string();
        let parameters = match operation {
            Operation::FillByFingerprint { fingerprint, value } => {
                vec![Value::String(fingerprint), Value::String(value)]
            }
            Operation::FillByQuery { selector, value }
            | Operation::SetValueByQuery { selector, value } => {
                vec![Value::String(selector), Value::String(value)]
            }
            Operation::ClickByFingerprint { fingerprint } => vec![Value::String(fingerprint)],
            Operation::ClickByQuery { selector } => vec![Value::String(selector)],
            Operation::TouchAllFields => Vec::new(),
            Operation::Delay(delay) => vec![Value::from(delay.as_millis() as u64)],
            Operation::Unsupported { parameters, .. } => parameters,
        };
        RawOperation {
            operation: name,
            parameters,
        }
    }
}

/// Strings pass through; numbers and booleans are stringified the way a page
/// script would coerce them.
fn parameter_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parameter_millis(value: &Value) -> Option<Duration> {
    let millis = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Duration::try_from_secs_f64(millis / 1000.0).ok()
}

/// Zero, negative, non-finite and out-of-range values yield `None`.
fn millis_to_duration(millis: f64) -> Option<Duration> {
    if millis > 0.0 {
        Duration::try_from_secs_f64(millis / 1000.0).ok()
    } else {
        None
    }
}

/// Treats an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_and_aliases() {
        let script = FillScript::parse(
            r##"{
                "script": [
                    {"operation": "fill_by_opid", "parameters": ["__a__0__", "user@example.com"]},
                    {"operation": "fillByQuery", "parameters": ["#pin", 1234]},
                    {"operation": "click_on_opid", "parameters": ["__a__1__"]},
                    {"operation": "touch_all_fields", "parameters": []},
                    {"operation": "delay", "parameters": [250]},
                    {"operation": "simple_set_value_by_query", "parameters": ["input.remember", "on"]}
                ],
                "properties": {"delay_between_operations": 20},
                "options": {"animateOnFill": false},
                "savedURL": "https://example.com/login",
                "fillContextIdentifier": "ctx-1"
            }"##,
        )
        .unwrap();

        assert_eq!(
            script.operations,
            vec![
                Operation::FillByFingerprint {
                    fingerprint: "__a__0__".into(),
                    value: "user@example.com".into()
                },
                Operation::FillByQuery {
                    selector: "#pin".into(),
                    value: "1234".into()
                },
                Operation::ClickByFingerprint {
                    fingerprint: "__a__1__".into()
                },
                Operation::TouchAllFields,
                Operation::Delay(Duration::from_millis(250)),
                Operation::SetValueByQuery {
                    selector: "input.remember".into(),
                    value: "on".into()
                },
            ]
        );
        assert_eq!(script.delay_between_operations(), Some(Duration::from_millis(20)));
        assert!(!script.options.animate);
        assert!(script.options.mark_filling);
        assert_eq!(script.fill_context_identifier.as_deref(), Some("ctx-1"));
    }

    #[test]
    fn unknown_or_incomplete_operations_are_kept_as_unsupported() {
        let script = FillScript::parse(
            r#"{"script": [
                {"operation": "focus_by_opid", "parameters": ["__a__0__"]},
                {"operation": "fill_by_opid", "parameters": ["__a__0__"]},
                {"parameters": []}
            ]}"#,
        )
        .unwrap();
        let names: Vec<&str> = script.operations.iter().map(Operation::name).collect();
        assert_eq!(names, vec!["focus_by_opid", "fill_by_opid", ""]);
        assert!(script
            .operations
            .iter()
            .all(|op| matches!(op, Operation::Unsupported { .. })));
    }

    #[test]
    fn empty_object_uses_defaults() {
        let script = FillScript::parse("{}").unwrap();
        assert!(script.operations.is_empty());
        assert!(script.options.animate);
        assert_eq!(script.delay_between_operations(), None);
    }

    #[test]
    fn null_properties_and_options_fall_back_to_defaults() {
        let script =
            FillScript::parse(r#"{"script": [], "options": null, "properties": null}"#).unwrap();
        assert_eq!(script.options, FillOptions::default());
        assert_eq!(script.properties, FillProperties::default());
    }

    #[test]
    fn out_of_range_delays_do_not_panic() {
        let script = FillScript::parse(
            r#"{
                "script": [
                    {"operation": "delay", "parameters": [1e300]},
                    {"operation": "delay", "parameters": ["-5"]},
                    {"operation": "delay", "parameters": [0]}
                ],
                "properties": {"delay_between_operations": 1e300}
            }"#,
        )
        .unwrap();
        assert!(matches!(script.operations[0], Operation::Unsupported { .. }));
        assert!(matches!(script.operations[1], Operation::Unsupported { .. }));
        assert_eq!(script.operations[2], Operation::Delay(Duration::ZERO));
        assert_eq!(script.delay_between_operations(), None);
    }

    #[test]
    fn null_and_garbage_are_malformed() {
        for payload in ["null", "", "{not json", "[1, 2]", r#"{"script": 5}"#] {
            assert!(
                matches!(FillScript::parse(payload), Err(Error::MalformedScript(_))),
                "{payload:?} should be malformed"
            );
        }
    }
}

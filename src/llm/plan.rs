use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PilotError, PilotResult};

/// Result of one step: the model's JSON object as-is, or a degraded error mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionPlan {
    Parsed(Map<String, Value>),
    Error(ErrorPlan),
}

/// Serializes as `{"error": ..., "message": <original text>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPlan {
    pub error: PlanErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanErrorKind {
    #[serde(rename = "No JSON object found")]
    NoJsonObject,
    #[serde(rename = "JSON parsing failed")]
    JsonParsingFailed,
}

impl std::fmt::Display for PlanErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanErrorKind::NoJsonObject => write!(f, "No JSON object found"),
            PlanErrorKind::JsonParsingFailed => write!(f, "JSON parsing failed"),
        }
    }
}

impl ActionPlan {
    pub fn error(kind: PlanErrorKind, message: impl Into<String>) -> Self {
        ActionPlan::Error(ErrorPlan {
            error: kind,
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionPlan::Error(_))
    }

    pub fn error_plan(&self) -> Option<&ErrorPlan> {
        match self {
            ActionPlan::Error(e) => Some(e),
            ActionPlan::Parsed(_) => None,
        }
    }

    /// `done` flag; absent or non-boolean counts as not done.
    pub fn is_done(&self) -> bool {
        match self {
            ActionPlan::Parsed(map) => map.get("done").and_then(Value::as_bool).unwrap_or(false),
            ActionPlan::Error(_) => false,
        }
    }

    /// Typed view of `steps`. The parser never validates the schema, so this is where a
    /// mapping without a usable step list is rejected.
    pub fn actions(&self) -> PilotResult<Vec<Action>> {
        let map = match self {
            ActionPlan::Parsed(map) => map,
            ActionPlan::Error(e) => return Err(PilotError::Plan(e.error.to_string())),
        };
        let steps = map
            .get("steps")
            .ok_or_else(|| PilotError::Plan("plan has no `steps` list".into()))?;
        serde_json::from_value(steps.clone())
            .map_err(|e| PilotError::Plan(format!("malformed `steps`: {e}")))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub function: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub human_readable_justification: String,
}

impl Action {
    pub fn command(&self) -> PilotResult<InputCommand> {
        let tagged = serde_json::json!({
            "function": self.function,
            "parameters": self.parameters,
        });
        serde_json::from_value(tagged)
            .map_err(|e| PilotError::Plan(format!("invalid `{}` action: {e}", self.function)))
    }
}

/// Input-automation vocabulary the model may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "function", content = "parameters")]
pub enum InputCommand {
    #[serde(rename = "press")]
    Press {
        #[serde(deserialize_with = "one_or_many")]
        keys: Vec<String>,
        #[serde(default = "default_one")]
        presses: u32,
        #[serde(default)]
        interval: f64,
    },
    #[serde(rename = "write")]
    Write {
        text: String,
        #[serde(default)]
        interval: f64,
    },
    #[serde(rename = "hotkey")]
    Hotkey {
        #[serde(deserialize_with = "one_or_many")]
        keys: Vec<String>,
    },
    #[serde(rename = "moveTo")]
    MoveTo {
        x: i32,
        y: i32,
        #[serde(default)]
        duration: f64,
    },
    #[serde(rename = "click")]
    Click {
        #[serde(default)]
        x: Option<i32>,
        #[serde(default)]
        y: Option<i32>,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_one")]
        clicks: u32,
        #[serde(default)]
        interval: f64,
    },
    #[serde(rename = "sleep")]
    Sleep { secs: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

fn default_one() -> u32 {
    1
}

/// Models often send `"keys": "enter"` instead of a one-element list.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Keys {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Keys::deserialize(deserializer)? {
        Keys::One(k) => vec![k],
        Keys::Many(ks) => ks,
    })
}

use serde_json::{Map, Value};

use crate::llm::plan::{ActionPlan, PlanErrorKind};

/// Recovers the JSON object embedded in a model reply.
///
/// Takes the span from the first `{` to the last `}` and parses it as an object; prose,
/// markdown fences and greetings around it are ignored. The result is not checked
/// against any schema. Two separate objects in one reply are spanned together and fail
/// to parse.
pub fn parse_action_plan(text: &str) -> ActionPlan {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        tracing::warn!(len = text.len(), "no JSON object found in model response");
        return ActionPlan::error(PlanErrorKind::NoJsonObject, text);
    };

    let candidate = if end >= start { text[start..=end].trim() } else { "" };

    match serde_json::from_str::<Map<String, Value>>(candidate) {
        Ok(map) => {
            tracing::debug!(keys = map.len(), "action plan parsed");
            ActionPlan::Parsed(map)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse JSON in model response");
            ActionPlan::error(PlanErrorKind::JsonParsingFailed, text)
        }
    }
}

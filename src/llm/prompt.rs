use serde::Serialize;

use crate::errors::PilotResult;
use crate::llm::types::{MessagePart, MultimodalMessage};

macro_rules! output_rules {
    () => {
        r#"The JSON should be formatted exactly as specified, without extra text. Only send back a valid JSON response that can be parsed without errors. Here is the expected format:

{
    "steps": [
        {
            "function": "...",
            "parameters": { ... },
            "human_readable_justification": "..."
        },
        ...
    ],
    "done": ...
}

Valid function names and their expected parameters are:
- "press": parameters: { "keys": ["key1", "key2", ...], "presses": int, "interval": float }
- "write": parameters: { "text": "string", "interval": float }
- "hotkey": parameters: { "keys": ["key1", "key2", ...] }
- "moveTo": parameters: { "x": int, "y": int, "duration": float }
- "click": parameters: { "x": int, "y": int, "button": "left" or "right", "clicks": int, "interval": float }
- "sleep": parameters: { "secs": float }

Valid key names for 'keys' parameters are:
- 'shift', 'ctrl', 'alt', 'command', 'tab', 'space', 'enter', 'left', 'right', 'up', 'down', etc.
Note: Use 'command' instead of 'cmd' for the Command key on macOS.
When responding, ensure you include all necessary steps to complete the user's request fully.
For example, to 'open Google', you might need to:
- Open the browser application.
- Navigate to 'www.google.com' in the browser.
Remember, only output the JSON response in this format without any additional text. Do not use 'pyautogui' as a function name. Use the specific function names listed above."#
    };
}

/// Instruction block prepended to the request metadata of every prompt.
pub const DEFAULT_CONTEXT: &str = concat!(
    "You control the mouse and keyboard of the user's computer to accomplish their objective. \
You receive the objective, the current step number and a screenshot of the screen. \
Respond with the JSON steps to perform next.\n",
    output_rules!(),
    "\n\n"
);

/// System-role message for the local chat protocol.
pub const SAFETY_PREAMBLE: &str = concat!(
    "You are assisting with personal, authorized commands on my own machine. \
User requests will be to control my computer locally for routine tasks \
(e.g., 'Open Sublime Text' or 'Create an Excel sheet with a meal plan'). \
You will respond with JSON steps that help me accomplish these commands, mapping to specific \
function calls that control the mouse and keyboard using pyautogui. \
This will be used only on my personal device for development and productivity purposes. ",
    output_rules!()
);

/// Extra hint sent by the local backend, whose models drift from the format more often.
pub const LOCAL_INSTRUCTIONS: &str =
    "Please provide step-by-step actions in JSON format to achieve the objective described.";

/// Per-step metadata serialized after the context block.
#[derive(Debug, Clone, Serialize)]
pub struct RequestData<'a> {
    pub objective: &'a str,
    pub step_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<&'a str>,
}

impl<'a> RequestData<'a> {
    pub fn new(objective: &'a str, step_number: u32) -> Self {
        Self {
            objective,
            step_number,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: &'a str) -> Self {
        self.instructions = Some(instructions);
        self
    }
}

/// `context + json(request)` followed by the image part.
pub fn build_message(
    context: &str,
    request: &RequestData<'_>,
    image: MessagePart,
) -> PilotResult<MultimodalMessage> {
    let request_json = serde_json::to_string(request)?;
    Ok(MultimodalMessage {
        parts: vec![MessagePart::Text(format!("{context}{request_json}")), image],
    })
}

//! Parser for ReAct-formatted model output.
//!
//! A completion either names a tool (`Action:` / `Action Input:`) or ends the
//! run (`Final Answer:`). Anything else is a parse error the loop feeds back
//! to the model as an observation.

use regex_lite::Regex;
use sagecord_core::agent::AgentAction;
use std::sync::LazyLock;

pub const FINAL_ANSWER: &str = "Final Answer:";

pub const MISSING_ACTION_AFTER_THOUGHT: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
pub const MISSING_ACTION_INPUT_AFTER_ACTION: &str =
    "Invalid Format: Missing 'Action Input:' after 'Action:'";
pub const FINAL_ANSWER_AND_ACTION: &str =
    "Parsing LLM output produced both a final answer and a parse-able action";

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:\s*(.*?)\s*Action\s*\d*\s*Input\s*\d*\s*:\s*(.*)")
        .expect("action pattern compiles")
});
static ACTION_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Action\s*\d*\s*:").expect("action pattern compiles"));
static ACTION_INPUT_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*Input\s*\d*\s*:").expect("action input pattern compiles")
});

/// What the model decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// Call a tool.
    Action(AgentAction),
    /// Stop with an answer.
    Finish { output: String, log: String },
}

/// A completion that fits neither shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Human-readable description.
    pub message: String,
    /// Correction to show the model, when there is a specific one.
    pub observation: Option<String>,
    /// The raw completion.
    pub llm_output: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parse one completion.
pub fn parse(text: &str) -> Result<ParsedOutput, ParseError> {
    let includes_answer = text.contains(FINAL_ANSWER);

    if let Some(caps) = ACTION.captures(text) {
        if includes_answer {
            return Err(ParseError {
                message: format!("{FINAL_ANSWER_AND_ACTION}: {text}"),
                observation: None,
                llm_output: text.to_string(),
            });
        }
        let tool = caps.get(1).map_or("", |m| m.as_str()).trim();
        let tool_input = caps
            .get(2)
            .map_or("", |m| m.as_str())
            .trim_matches(' ')
            .trim_matches('"');
        return Ok(ParsedOutput::Action(AgentAction {
            tool: tool.to_string(),
            tool_input: tool_input.to_string(),
            log: text.to_string(),
        }));
    }

    if includes_answer {
        let output = text.rsplit(FINAL_ANSWER).next().unwrap_or_default().trim();
        return Ok(ParsedOutput::Finish {
            output: output.to_string(),
            log: text.to_string(),
        });
    }

    let message = format!("Could not parse LLM output: `{text}`");
    let observation = if !ACTION_ONLY.is_match(text) {
        Some(MISSING_ACTION_AFTER_THOUGHT.to_string())
    } else if !ACTION_INPUT_ONLY.is_match(text) {
        Some(MISSING_ACTION_INPUT_AFTER_ACTION.to_string())
    } else {
        None
    };

    Err(ParseError {
        message,
        observation,
        llm_output: text.to_string(),
    })
}

//! The ReAct prompt and scratchpad rendering.

use sagecord_core::agent::AgentStep;

/// The fixed instruction template.
///
/// Placeholders: `{tools}`, `{tool_names}`, `{input}`, `{agent_scratchpad}`.
pub const REACT_TEMPLATE: &str = "Answer the following questions as best you can in the same language as the question. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!

Question: {input}
Thought:{agent_scratchpad}";

/// Rendered into the scratchpad after each observation.
const OBSERVATION_PREFIX: &str = "Observation: ";
const THOUGHT_PREFIX: &str = "Thought: ";

/// Fill the template's placeholders in a single pass.
///
/// Substituted values are never rescanned, so braces inside a question or a
/// search snippet pass through untouched.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Replay prior steps so the model continues where it left off.
pub fn scratchpad(steps: &[AgentStep]) -> String {
    let mut thoughts = String::new();
    for step in steps {
        thoughts.push_str(&step.action.log);
        thoughts.push('\n');
        thoughts.push_str(OBSERVATION_PREFIX);
        thoughts.push_str(&step.observation);
        thoughts.push('\n');
        thoughts.push_str(THOUGHT_PREFIX);
    }
    thoughts
}

/// The full prompt for one iteration.
pub fn build(tools: &str, tool_names: &str, question: &str, steps: &[AgentStep]) -> String {
    let pad = scratchpad(steps);
    render(
        REACT_TEMPLATE,
        &[
            ("tools", tools),
            ("tool_names", tool_names),
            ("input", question),
            ("agent_scratchpad", &pad),
        ],
    )
}

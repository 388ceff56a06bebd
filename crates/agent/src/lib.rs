//! The reasoning loop at the heart of Sagecord.
//!
//! The agent follows a **Thought → Action → Observation** cycle over a
//! plain-text protocol:
//!
//! 1. **Render** the ReAct prompt with the tool list, the question and the
//!    scratchpad of prior steps
//! 2. **Ask the model** to continue, stopping before `Observation`
//! 3. **Parse** the continuation into an action or a final answer
//! 4. **If action**: run the tool, record the observation, loop back to 1
//! 5. **If final answer**: return it with every intermediate step
//!
//! The loop is capped at a fixed number of model calls.

pub mod parser;
pub mod prompt;
pub mod react;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use parser::{ParseError, ParsedOutput};
pub use react::ReactAgent;

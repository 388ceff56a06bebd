//! ReAct loop: Thought → Action → Observation.
//!
//! Each iteration renders the prompt with the scratchpad of prior steps,
//! asks the model for a continuation (stopping before it can invent an
//! observation), and parses the result:
//!
//! - **Final Answer** ends the run.
//! - **Action** dispatches to the tool registry; the tool's output (or
//!   failure) becomes the step's observation.
//! - **Unparseable** output is recorded as an `_Exception` step whose
//!   observation tells the model what was wrong.
//!
//! The loop gives up after `max_iterations` model calls.

use async_trait::async_trait;
use sagecord_core::agent::{Agent, AgentAction, AgentError, AgentOutcome, AgentStep};
use sagecord_core::provider::{Provider, ProviderRequest};
use sagecord_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::parser::{self, ParseError, ParsedOutput};
use crate::prompt;

/// Keeps the model from writing its own observations.
pub const STOP_SEQUENCE: &str = "\nObservation";
/// Output when the iteration cap is hit before a final answer.
pub const ITERATION_LIMIT_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";
/// Tool name recorded for steps produced by parse errors.
pub const EXCEPTION_TOOL: &str = "_Exception";
const INVALID_RESPONSE: &str = "Invalid or incomplete response";
const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// A ReAct agent over a fixed tool registry.
pub struct ReactAgent {
    /// Model endpoint.
    provider: Arc<dyn Provider>,
    /// Model name.
    model: String,
    /// Temperature.
    temperature: f32,
    /// Max tokens per completion.
    max_tokens: Option<u32>,
    /// Tool registry.
    tools: Arc<ToolRegistry>,
    /// Maximum model calls per run.
    max_iterations: u32,
}

impl ReactAgent {
    /// Create a new ReAct agent.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the max tokens per completion.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Run the tool the model asked for and describe what happened.
    async fn observe(&self, action: &AgentAction) -> String {
        let Some(tool) = self.tools.get(&action.tool) else {
            warn!(tool = %action.tool, "Model requested an unknown tool");
            return format!(
                "{} is not a valid tool, try one of [{}].",
                action.tool,
                self.tools.names().join(", ")
            );
        };

        let start = std::time::Instant::now();
        let result = tool.invoke(&action.tool_input).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                info!(tool = %action.tool, duration_ms, "Tool call succeeded");
                output
            }
            Err(e) => {
                warn!(tool = %action.tool, duration_ms, "Tool call failed: {e}");
                format!("Tool error: {e}")
            }
        }
    }

    /// Turn a parse failure into a step the model can learn from.
    fn exception_step(err: ParseError) -> AgentStep {
        let (observation, log) = match err.observation {
            Some(observation) => (observation, err.llm_output),
            None => (INVALID_RESPONSE.to_string(), err.message),
        };
        AgentStep {
            action: AgentAction {
                tool: EXCEPTION_TOOL.into(),
                tool_input: observation.clone(),
                log,
            },
            observation,
        }
    }

    /// Execute the ReAct loop.
    pub async fn run(&self, question: &str) -> Result<AgentOutcome, AgentError> {
        if question.trim().is_empty() {
            return Err(AgentError::Invalid("question must not be empty".into()));
        }

        let tool_descriptions = self.tools.describe();
        let tool_names = self.tools.names().join(", ");
        let mut steps: Vec<AgentStep> = Vec::new();

        info!(model = %self.model, max_iter = self.max_iterations, "ReAct loop starting");

        for iteration in 1..=self.max_iterations as usize {
            debug!(iteration, "ReAct iteration");

            let mut request = ProviderRequest::prompt(
                &self.model,
                prompt::build(&tool_descriptions, &tool_names, question, &steps),
                self.temperature,
            )
            .with_stop(vec![STOP_SEQUENCE.to_string()]);
            request.max_tokens = self.max_tokens;

            let response = self.provider.complete(request).await?;
            let text = response.message.content;

            match parser::parse(&text) {
                Ok(ParsedOutput::Finish { output, .. }) => {
                    info!(iterations = iteration, steps = steps.len(), "ReAct loop completed");
                    return Ok(AgentOutcome {
                        output,
                        intermediate_steps: steps,
                        iterations: iteration,
                    });
                }
                Ok(ParsedOutput::Action(action)) => {
                    debug!(tool = %action.tool, input = %action.tool_input, "ReAct action");
                    let observation = self.observe(&action).await;
                    steps.push(AgentStep { action, observation });
                }
                Err(e) => {
                    warn!(iteration, "Unparseable model output: {e}");
                    steps.push(Self::exception_step(e));
                }
            }
        }

        warn!("ReAct: max iterations reached ({})", self.max_iterations);
        Ok(AgentOutcome {
            output: ITERATION_LIMIT_OUTPUT.into(),
            intermediate_steps: steps,
            iterations: self.max_iterations as usize,
        })
    }
}

#[async_trait]
impl Agent for ReactAgent {
    async fn run(&self, question: &str) -> Result<AgentOutcome, AgentError> {
        ReactAgent::run(self, question).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::MISSING_ACTION_AFTER_THOUGHT;
    use crate::test_helpers::*;
    use sagecord_core::error::ProviderError;

    fn agent(provider: Arc<SequentialMockProvider>) -> ReactAgent {
        ReactAgent::new(provider, "mock-model", 0.0, Arc::new(search_registry()))
    }

    #[tokio::test]
    async fn direct_answer_has_no_steps() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            " I know this.\nFinal Answer: Tokyo",
        ]));
        let outcome = agent(provider.clone()).run("Capital of Japan?").await.unwrap();

        assert_eq!(outcome.output, "Tokyo");
        assert!(outcome.intermediate_steps.is_empty());
        assert!(outcome.first_log().is_none());
        assert_eq!(outcome.iterations, 1);

        let requests = provider.requests();
        assert_eq!(requests[0].stop, vec![STOP_SEQUENCE.to_string()]);
        assert!(requests[0].temperature.abs() < f32::EPSILON);
        assert!(requests[0].messages[0].content.ends_with("Question: Capital of Japan?\nThought:"));
    }

    #[tokio::test]
    async fn completion_budget_is_sent_with_every_call() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "Action: google_search\nAction Input: Kyoto",
            "Final Answer: Sunny",
        ]));
        agent(provider.clone()).with_max_tokens(256).run("Weather?").await.unwrap();

        let budgets: Vec<Option<u32>> = provider.requests().iter().map(|r| r.max_tokens).collect();
        assert_eq!(budgets, vec![Some(256), Some(256)]);
    }

    #[tokio::test]
    async fn thought_action_observation_cycle() {
        let first = " I should look this up.\nAction: google_search\nAction Input: Kyoto weather";
        let provider = Arc::new(SequentialMockProvider::texts(&[
            first,
            " I now know the final answer\nFinal Answer: Sunny",
        ]));
        let outcome = agent(provider.clone()).run("Weather in Kyoto?").await.unwrap();

        assert_eq!(outcome.output, "Sunny");
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.intermediate_steps.len(), 1);
        let step = &outcome.intermediate_steps[0];
        assert_eq!(step.action.tool, "google_search");
        assert_eq!(step.action.tool_input, "Kyoto weather");
        assert_eq!(step.observation, "results for: Kyoto weather");
        assert_eq!(outcome.first_log(), Some(first));

        // Second prompt replays the first step.
        let second_prompt = &provider.requests()[1].messages[0].content;
        assert!(second_prompt.ends_with(&format!(
            "Thought:{first}\nObservation: results for: Kyoto weather\nThought: "
        )));
    }

    #[tokio::test]
    async fn iteration_cap_stops_the_loop() {
        let looping = "Action: google_search\nAction Input: again";
        let provider = Arc::new(SequentialMockProvider::texts(&[looping; 5]));
        let outcome = agent(provider.clone()).run("Loop forever").await.unwrap();

        assert_eq!(outcome.output, ITERATION_LIMIT_OUTPUT);
        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.intermediate_steps.len(), 5);
        assert_eq!(provider.call_count(), 5);
    }

    #[tokio::test]
    async fn custom_cap_is_honoured() {
        let looping = "Action: google_search\nAction Input: again";
        let provider = Arc::new(SequentialMockProvider::texts(&[looping; 2]));
        let outcome = agent(provider.clone())
            .with_max_iterations(2)
            .run("Loop")
            .await
            .unwrap();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn parse_errors_are_fed_back() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "I think the answer is obvious.",
            "Final Answer: 42",
        ]));
        let outcome = agent(provider.clone()).run("Meaning of life?").await.unwrap();

        assert_eq!(outcome.output, "42");
        let step = &outcome.intermediate_steps[0];
        assert_eq!(step.action.tool, EXCEPTION_TOOL);
        assert_eq!(step.observation, MISSING_ACTION_AFTER_THOUGHT);
        assert_eq!(step.action.log, "I think the answer is obvious.");
        assert!(provider.requests()[1].messages[0]
            .content
            .contains(&format!("Observation: {MISSING_ACTION_AFTER_THOUGHT}")));
    }

    #[tokio::test]
    async fn ambiguous_output_gets_generic_observation() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "Action: google_search\nAction Input: x\nFinal Answer: y",
            "Final Answer: y",
        ]));
        let outcome = agent(provider).run("q").await.unwrap();
        let step = &outcome.intermediate_steps[0];
        assert_eq!(step.observation, "Invalid or incomplete response");
        assert!(step.action.log.starts_with(crate::parser::FINAL_ANSWER_AND_ACTION));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_observation() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "Action: calculator\nAction Input: 2+2",
            "Final Answer: 4",
        ]));
        let outcome = agent(provider).run("2+2?").await.unwrap();
        assert_eq!(
            outcome.intermediate_steps[0].observation,
            "calculator is not a valid tool, try one of [google_search]."
        );
    }

    #[tokio::test]
    async fn tool_failures_do_not_abort() {
        let provider = Arc::new(SequentialMockProvider::texts(&[
            "Action: google_search\nAction Input: fail",
            "Final Answer: could not search",
        ]));
        let outcome = agent(provider).run("q").await.unwrap();
        assert!(outcome.intermediate_steps[0].observation.starts_with("Tool error:"));
        assert_eq!(outcome.output, "could not search");
    }

    #[tokio::test]
    async fn validation_failures_are_recoverable() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(
            ProviderError::InvalidRequest("model name must not be empty".into()),
        )]));
        let err = agent(provider).run("q").await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("model name must not be empty"));
    }

    #[tokio::test]
    async fn transport_failures_are_fatal() {
        let provider = Arc::new(SequentialMockProvider::new(vec![Err(ProviderError::Network(
            "connection reset".into(),
        ))]));
        let err = agent(provider).run("q").await.unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn empty_question_is_rejected_without_calling_the_model() {
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let err = agent(provider.clone()).run("   ").await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(provider.call_count(), 0);
    }
}

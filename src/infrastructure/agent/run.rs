//! One turn of the query workflow, advanced a node at a time

use std::time::Instant;

use futures::stream::{self, Stream};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

use super::SqlAgent;
use crate::domain::agent::{prompts, AgentError, StepEvent, TokenUsage, WorkflowGraph, WorkflowNode};
use crate::domain::conversation::ConversationState;
use crate::domain::llm::{Message, ToolCall};
use crate::domain::tools::LIST_TABLES_TOOL;
use crate::infrastructure::observability::{record_step, record_tool, record_turn};

/// How a finished turn reached its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnCompletion {
    /// The result was formatted into an answer
    Answered,
    /// Every query attempt failed and the fixed fallback answer was given
    Exhausted,
}

impl TurnCompletion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::Exhausted => "exhausted",
        }
    }
}

/// Result of a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub answer: String,
    pub usage: TokenUsage,
    pub attempts: u32,
    pub completion: TurnCompletion,
}

/// A single turn in progress.
///
/// Each call to [`WorkflowRun::next_step`] executes exactly one node and
/// reports it; once the run reaches `Done` it yields nothing more. A run
/// cannot be restarted, and after a failure it refuses to continue.
#[derive(Debug)]
pub struct WorkflowRun {
    agent: SqlAgent,
    state: ConversationState,
    node: WorkflowNode,
    usage: TokenUsage,
    attempts: u32,
    steps: usize,
    answer: Option<String>,
    completion: Option<TurnCompletion>,
    aborted: bool,
    span: Span,
    started: Instant,
}

impl WorkflowRun {
    pub(crate) fn new(agent: SqlAgent, question: String) -> Self {
        let span = info_span!(
            "agent_chain",
            session_id = field::Empty,
            llm.usage.prompt_tokens = field::Empty,
            llm.usage.completion_tokens = field::Empty,
            llm.usage.total_tokens = field::Empty,
            attempts = field::Empty,
        );

        Self {
            agent,
            state: ConversationState::with_question(question),
            node: WorkflowGraph::START,
            usage: TokenUsage::default(),
            attempts: 0,
            steps: 0,
            answer: None,
            completion: None,
            aborted: false,
            span,
            started: Instant::now(),
        }
    }

    /// Tag the run's span with the session it belongs to
    pub fn for_session(self, session_id: &str) -> Self {
        self.span.record("session_id", session_id);
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Node the next call to `next_step` will execute
    pub fn current_node(&self) -> WorkflowNode {
        self.node
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_finished(&self) -> bool {
        self.node.is_terminal()
    }

    /// Execute the next node and report what it appended
    pub async fn next_step(&mut self) -> Result<Option<StepEvent>, AgentError> {
        if self.aborted {
            return Err(AgentError::RunAborted);
        }
        if self.node.is_terminal() {
            return Ok(None);
        }

        let max_steps = self.agent.config().max_steps;
        if self.steps >= max_steps {
            return Err(self.abort(AgentError::StepBudget { max_steps }));
        }
        self.steps += 1;

        let node = self.node;
        let before = self.state.len();
        let started = Instant::now();
        let span = self.span.clone();

        let result = self.execute(node).instrument(span).await;
        let (usage, next) = match result {
            Ok(step) => step,
            Err(e) => return Err(self.abort(e)),
        };

        self.usage += usage;
        self.node = next;
        self.record_usage();

        let duration = started.elapsed();
        record_step(node.as_str(), duration);

        if self.node.is_terminal() {
            self.finish_metrics();
        }

        Ok(Some(StepEvent {
            node,
            messages: self.state.messages()[before..].to_vec(),
            usage,
            attempt: self.attempts,
            duration_ms: duration.as_millis() as u64,
        }))
    }

    /// Drive the run to `Done` and return the outcome
    pub async fn finish(mut self) -> Result<TurnOutcome, AgentError> {
        while self.next_step().await?.is_some() {}

        Ok(TurnOutcome {
            answer: self.answer.take().unwrap_or_default(),
            usage: self.usage,
            attempts: self.attempts,
            completion: self.completion.unwrap_or(TurnCompletion::Answered),
            state: self.state,
        })
    }

    /// Adapt the run into a stream of step events. The stream ends after
    /// the last node or right after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<StepEvent, AgentError>> + Send {
        stream::unfold(Some(self), |run| async move {
            let mut run = run?;
            match run.next_step().await {
                Ok(Some(event)) => Some((Ok(event), Some(run))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn execute(&mut self, node: WorkflowNode) -> Result<(TokenUsage, WorkflowNode), AgentError> {
        debug!(node = %node, attempt = self.attempts, "Executing step");

        match node {
            WorkflowNode::Seed => {
                let call = ToolCall::with_generated_id(LIST_TABLES_TOOL, json!({}));
                self.state
                    .append(Message::assistant_with_tool_calls(None, vec![call]));
                Ok((TokenUsage::default(), WorkflowNode::ListTables))
            }
            WorkflowNode::ListTables | WorkflowNode::FetchSchema | WorkflowNode::ExecuteQuery => {
                self.run_tools(node).await?;
                Ok((TokenUsage::default(), self.route_after(node)))
            }
            WorkflowNode::SelectSchema => {
                let (message, usage) = self.agent.select_schema(&self.state).await?;
                self.state.append(message);
                Ok((usage, WorkflowNode::FetchSchema))
            }
            WorkflowNode::GenerateQuery => {
                self.attempts += 1;
                let (message, usage) = self.agent.generate_query(&self.state).await?;
                self.state.append(message);
                Ok((usage, WorkflowNode::ValidateQuery))
            }
            WorkflowNode::ValidateQuery => {
                let (message, usage) = self.agent.validate_query(&self.state).await?;
                self.state.append(message);
                Ok((usage, WorkflowNode::ExecuteQuery))
            }
            WorkflowNode::FormatResponse => {
                let (message, usage) = self.agent.format_response(&self.state).await?;
                self.answer = message.content_text().map(str::to_string);
                self.completion = Some(TurnCompletion::Answered);
                self.state.append(message);
                Ok((usage, WorkflowNode::Done))
            }
            WorkflowNode::Done => Ok((TokenUsage::default(), WorkflowNode::Done)),
        }
    }

    async fn run_tools(&mut self, node: WorkflowNode) -> Result<(), AgentError> {
        let calls = self
            .state
            .last()
            .map(|m| m.tool_calls().to_vec())
            .unwrap_or_default();

        let Some(tools) = self.agent.tool_node(node) else {
            return Ok(());
        };

        let results = tools.execute(&calls).await;
        for (call, result) in calls.iter().zip(&results) {
            record_tool(&call.name, !result.is_failed_tool_result());
        }

        self.state.append_tool_results(results)?;
        Ok(())
    }

    fn route_after(&mut self, node: WorkflowNode) -> WorkflowNode {
        if node != WorkflowNode::ExecuteQuery {
            return WorkflowGraph::next(node).unwrap_or(WorkflowNode::Done);
        }

        let next = WorkflowGraph::route_after_execution(&self.state);
        if next == WorkflowNode::GenerateQuery && self.agent.config().attempts_exhausted(self.attempts) {
            warn!(
                attempts = self.attempts,
                "Query attempts exhausted, giving up on the question"
            );
            self.state.append(Message::assistant(prompts::UNABLE_TO_ANSWER));
            self.answer = Some(prompts::UNABLE_TO_ANSWER.to_string());
            self.completion = Some(TurnCompletion::Exhausted);
            return WorkflowNode::Done;
        }

        if next == WorkflowNode::GenerateQuery {
            debug!(attempt = self.attempts, "Query failed, regenerating");
        }
        next
    }

    fn abort(&mut self, error: AgentError) -> AgentError {
        self.aborted = true;
        warn!(parent: &self.span, error = %error, node = %self.node, "Turn failed");
        record_turn(
            "failed",
            self.attempts,
            u64::from(self.usage.total_tokens()),
            self.started.elapsed(),
        );
        error
    }

    fn record_usage(&self) {
        self.span
            .record("llm.usage.prompt_tokens", self.usage.prompt_tokens)
            .record("llm.usage.completion_tokens", self.usage.completion_tokens)
            .record("llm.usage.total_tokens", self.usage.total_tokens())
            .record("attempts", self.attempts);
    }

    fn finish_metrics(&self) {
        let completion = self.completion.unwrap_or(TurnCompletion::Answered);
        info!(
            parent: &self.span,
            completion = completion.as_str(),
            attempts = self.attempts,
            total_tokens = self.usage.total_tokens(),
            "Turn finished"
        );
        record_turn(
            completion.as_str(),
            self.attempts,
            u64::from(self.usage.total_tokens()),
            self.started.elapsed(),
        );
    }
}

//! SQL agent: the model calls and tool nodes of the query workflow

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use super::{SqlAgentConfig, TurnOutcome, WorkflowRun};
use crate::domain::agent::{policy, prompts, AgentError, TokenUsage, WorkflowNode};
use crate::domain::conversation::ConversationState;
use crate::domain::llm::{
    LlmProvider, LlmRequest, LlmRequestBuilder, Message, ToolCall, ToolChoice, ToolDefinition,
};
use crate::domain::sql::SqlDatabase;
use crate::domain::tools::{
    ListTablesTool, QueryTool, SchemaTool, Tool, ToolNode, QUERY_TOOL, SCHEMA_TOOL,
};
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

/// Drives natural-language questions through the query workflow.
///
/// Cloning is cheap; every turn gets its own [`WorkflowRun`].
#[derive(Debug, Clone)]
pub struct SqlAgent {
    llm: Arc<dyn LlmProvider>,
    dialect: &'static str,
    config: SqlAgentConfig,
    list_tables: ToolNode,
    fetch_schema: ToolNode,
    execute_query: ToolNode,
    schema_tool: ToolDefinition,
    query_tool: ToolDefinition,
}

impl SqlAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        db: Arc<dyn SqlDatabase>,
        config: SqlAgentConfig,
    ) -> Self {
        let schema = Arc::new(SchemaTool::new(Arc::clone(&db)));
        let query = Arc::new(QueryTool::new(Arc::clone(&db), config.max_cell_chars));

        Self {
            llm,
            dialect: db.dialect(),
            schema_tool: schema.definition(),
            query_tool: query.definition(),
            list_tables: ToolNode::single(Arc::new(ListTablesTool::new(db))),
            fetch_schema: ToolNode::single(schema),
            execute_query: ToolNode::single(query),
            config,
        }
    }

    pub fn config(&self) -> &SqlAgentConfig {
        &self.config
    }

    pub fn dialect(&self) -> &'static str {
        self.dialect
    }

    /// Begin a turn. Nothing runs until the returned run is polled.
    pub fn start_turn(&self, question: impl Into<String>) -> WorkflowRun {
        WorkflowRun::new(self.clone(), question.into())
    }

    /// Run a whole turn and return its outcome
    pub async fn run_turn(&self, question: impl Into<String>) -> Result<TurnOutcome, AgentError> {
        self.start_turn(question).finish().await
    }

    pub(crate) fn tool_node(&self, node: WorkflowNode) -> Option<&ToolNode> {
        match node {
            WorkflowNode::ListTables => Some(&self.list_tables),
            WorkflowNode::FetchSchema => Some(&self.fetch_schema),
            WorkflowNode::ExecuteQuery => Some(&self.execute_query),
            _ => None,
        }
    }

    fn request(&self) -> LlmRequestBuilder {
        let builder = LlmRequest::builder();
        match self.config.temperature {
            Some(temperature) => builder.temperature(temperature),
            None => builder,
        }
    }

    async fn call_model(
        &self,
        node: WorkflowNode,
        request: LlmRequest,
    ) -> Result<(Message, TokenUsage), AgentError> {
        let prompt = request.messages.clone();
        let start = Instant::now();

        debug!(
            node = %node,
            messages = prompt.len(),
            tools = request.tools.len(),
            "Calling language model"
        );

        let result = self.llm.chat(&self.config.model, request).await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                record_llm_request(LlmRequestMetricParams {
                    provider: self.llm.provider_name(),
                    model: &self.config.model,
                    node: node.as_str(),
                    duration: start.elapsed(),
                    success: false,
                    input_tokens: None,
                    output_tokens: None,
                });
                return Err(AgentError::llm(node, e));
            }
        };

        let usage = TokenUsage::for_call(response.usage, &prompt, &response.message);

        record_llm_request(LlmRequestMetricParams {
            provider: self.llm.provider_name(),
            model: &self.config.model,
            node: node.as_str(),
            duration: start.elapsed(),
            success: true,
            input_tokens: Some(u64::from(usage.prompt_tokens)),
            output_tokens: Some(u64::from(usage.completion_tokens)),
        });

        Ok((response.message, usage))
    }

    /// Ask the model which tables matter; it must call the schema tool
    pub(crate) async fn select_schema(
        &self,
        state: &ConversationState,
    ) -> Result<(Message, TokenUsage), AgentError> {
        let node = WorkflowNode::SelectSchema;
        let request = self
            .request()
            .messages(state.messages().iter().cloned())
            .tool(self.schema_tool.clone())
            .tool_choice(ToolChoice::Function(SCHEMA_TOOL.to_string()))
            .build();

        let (reply, usage) = self.call_model(node, request).await?;
        let Message::Assistant {
            content,
            tool_calls,
        } = reply
        else {
            return Err(AgentError::missing_tool_call(node, SCHEMA_TOOL));
        };

        if tool_calls.is_empty() {
            return Err(AgentError::missing_tool_call(node, SCHEMA_TOOL));
        }

        let calls = unique_calls(tool_calls, state);
        Ok((Message::assistant_with_tool_calls(content, calls), usage))
    }

    /// Produce a candidate query, or a final answer, as free text
    pub(crate) async fn generate_query(
        &self,
        state: &ConversationState,
    ) -> Result<(Message, TokenUsage), AgentError> {
        let request = self
            .request()
            .system(prompts::query_generation(self.dialect))
            .messages(state.messages().iter().cloned())
            .build();

        let (reply, usage) = self.call_model(WorkflowNode::GenerateQuery, request).await?;
        let content = reply.content_text().map(str::to_string);

        if let Some(text) = &content {
            let keywords = policy::data_modification_keywords(text);
            if !keywords.is_empty() {
                warn!(keywords = ?keywords, "Generated query contains data modification statements");
            }
        }

        // No tools are bound here; any call the model still emits would be
        // left unanswered in the transcript.
        Ok((Message::assistant_with_tool_calls(content, Vec::new()), usage))
    }

    /// Review the latest candidate and turn it into exactly one query tool call
    pub(crate) async fn validate_query(
        &self,
        state: &ConversationState,
    ) -> Result<(Message, TokenUsage), AgentError> {
        let node = WorkflowNode::ValidateQuery;
        let candidate = state
            .last()
            .and_then(Message::content_text)
            .unwrap_or_default();

        let request = self
            .request()
            .system(prompts::query_check(self.dialect))
            .user(candidate)
            .tool(self.query_tool.clone())
            .tool_choice(ToolChoice::Required)
            .parallel_tool_calls(false)
            .build();

        let (reply, usage) = self.call_model(node, request).await?;
        let Message::Assistant {
            content,
            tool_calls,
        } = reply
        else {
            return Err(AgentError::missing_tool_call(node, QUERY_TOOL));
        };

        let dropped = tool_calls.len().saturating_sub(1);
        let call = tool_calls
            .into_iter()
            .find(|call| call.name == QUERY_TOOL)
            .ok_or_else(|| AgentError::missing_tool_call(node, QUERY_TOOL))?;

        if dropped > 0 {
            debug!(dropped, "Dropped extra tool calls from validation reply");
        }

        let calls = unique_calls(vec![call], state);
        Ok((Message::assistant_with_tool_calls(content, calls), usage))
    }

    /// Turn the latest raw result into a readable answer
    pub(crate) async fn format_response(
        &self,
        state: &ConversationState,
    ) -> Result<(Message, TokenUsage), AgentError> {
        let input = state
            .last()
            .and_then(Message::content_text)
            .unwrap_or_default();

        let request = self
            .request()
            .system(prompts::format_response(input))
            .user(input)
            .build();

        let (reply, usage) = self.call_model(WorkflowNode::FormatResponse, request).await?;
        let answer = reply.content_text().unwrap_or_default().to_string();

        Ok((Message::assistant(answer), usage))
    }
}

/// Keep each call's id unless it is empty, already used in the transcript
/// or used by an earlier call of the same reply
fn unique_calls(calls: Vec<ToolCall>, state: &ConversationState) -> Vec<ToolCall> {
    let mut taken: HashSet<String> = state
        .messages()
        .iter()
        .flat_map(Message::tool_calls)
        .map(|existing| existing.id.clone())
        .collect();

    calls
        .into_iter()
        .map(|call| {
            let call = if call.id.is_empty() || taken.contains(&call.id) {
                ToolCall::with_generated_id(call.name, call.arguments)
            } else {
                call
            };
            taken.insert(call.id.clone());
            call
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unique_calls_keep_fresh_ids() {
        let state = ConversationState::with_question("q");
        let call = ToolCall::new("call_1", QUERY_TOOL, json!({"query": "SELECT 1"}));

        assert_eq!(unique_calls(vec![call.clone()], &state), vec![call]);
    }

    #[test]
    fn test_unique_calls_replace_reused_id() {
        let mut state = ConversationState::with_question("q");
        state.append(Message::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", QUERY_TOOL, json!({"query": "SELECT 1"}))],
        ));

        let calls = unique_calls(
            vec![ToolCall::new("call_1", QUERY_TOOL, json!({"query": "SELECT 2"}))],
            &state,
        );

        assert_ne!(calls[0].id, "call_1");
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(calls[0].argument_str("query"), Some("SELECT 2"));
    }

    #[test]
    fn test_unique_calls_replace_empty_id() {
        let state = ConversationState::new();
        let calls = unique_calls(vec![ToolCall::new("", SCHEMA_TOOL, json!({}))], &state);

        assert!(!calls[0].id.is_empty());
    }

    #[test]
    fn test_unique_calls_separate_siblings_sharing_an_id() {
        let state = ConversationState::with_question("q");
        let calls = unique_calls(
            vec![
                ToolCall::new("call_0", SCHEMA_TOOL, json!({"table_names": "customers"})),
                ToolCall::new("call_0", SCHEMA_TOOL, json!({"table_names": "orders"})),
            ],
            &state,
        );

        assert_eq!(calls[0].id, "call_0");
        assert_ne!(calls[1].id, "call_0");
        assert_eq!(calls[1].argument_str("table_names"), Some("orders"));
    }
}

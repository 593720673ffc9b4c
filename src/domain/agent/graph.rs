//! Static edge table of the query workflow

use super::WorkflowNode;
use crate::domain::conversation::ConversationState;

/// The fixed workflow graph.
///
/// Every edge is unconditional except the one leaving `ExecuteQuery`, which
/// is decided by [`WorkflowGraph::route_after_execution`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowGraph;

impl WorkflowGraph {
    pub const START: WorkflowNode = WorkflowNode::Seed;

    /// Successor over an unconditional edge. `None` for the conditional
    /// node and the terminal node.
    pub fn next(node: WorkflowNode) -> Option<WorkflowNode> {
        use WorkflowNode::*;

        match node {
            Seed => Some(ListTables),
            ListTables => Some(SelectSchema),
            SelectSchema => Some(FetchSchema),
            FetchSchema => Some(GenerateQuery),
            GenerateQuery => Some(ValidateQuery),
            ValidateQuery => Some(ExecuteQuery),
            ExecuteQuery => None,
            FormatResponse => Some(Done),
            Done => None,
        }
    }

    /// Branch taken after the query ran: back to generation when the last
    /// tool result failed, on to formatting otherwise.
    pub fn route_after_execution(state: &ConversationState) -> WorkflowNode {
        match state.last() {
            Some(message) if message.is_failed_tool_result() => WorkflowNode::GenerateQuery,
            _ => WorkflowNode::FormatResponse,
        }
    }

    fn conditional_targets() -> [WorkflowNode; 2] {
        [WorkflowNode::GenerateQuery, WorkflowNode::FormatResponse]
    }

    /// Mermaid flowchart of the graph; conditional edges are dotted
    pub fn to_mermaid() -> String {
        let mut out = String::from("%%{init: {'flowchart': {'curve': 'linear'}}}%%\ngraph TD;\n");
        out.push_str("\t__start__([<p>__start__</p>]):::first\n");
        for node in WorkflowNode::ALL {
            if node.is_terminal() {
                continue;
            }
            out.push_str(&format!("\t{}({})\n", node, node));
        }
        out.push_str("\t__end__([<p>__end__</p>]):::last\n");

        out.push_str(&format!("\t__start__ --> {};\n", Self::START));
        for node in WorkflowNode::ALL {
            match Self::next(node) {
                Some(WorkflowNode::Done) => out.push_str(&format!("\t{} --> __end__;\n", node)),
                Some(next) => out.push_str(&format!("\t{} --> {};\n", node, next)),
                None if node == WorkflowNode::ExecuteQuery => {
                    for target in Self::conditional_targets() {
                        out.push_str(&format!("\t{} -.-> {};\n", node, target));
                    }
                }
                None => {}
            }
        }

        out.push_str("\tclassDef default fill:#f2f0ff,line-height:1.2\n");
        out.push_str("\tclassDef first fill-opacity:0\n");
        out.push_str("\tclassDef last fill:#bfb6fc\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{Message, ToolCall, ToolStatus};
    use serde_json::json;

    fn executed(result: Message) -> ConversationState {
        let mut state = ConversationState::with_question("q");
        state.append(Message::assistant_with_tool_calls(
            None,
            vec![ToolCall::new("call_1", "db_query_tool", json!({"query": "SELECT 1"}))],
        ));
        state.append(result);
        state
    }

    #[test]
    fn test_linear_path() {
        let mut path = vec![WorkflowGraph::START];
        let mut node = WorkflowGraph::START;
        while let Some(next) = WorkflowGraph::next(node) {
            path.push(next);
            node = next;
        }

        assert_eq!(
            path,
            vec![
                WorkflowNode::Seed,
                WorkflowNode::ListTables,
                WorkflowNode::SelectSchema,
                WorkflowNode::FetchSchema,
                WorkflowNode::GenerateQuery,
                WorkflowNode::ValidateQuery,
                WorkflowNode::ExecuteQuery,
            ]
        );
        assert_eq!(
            WorkflowGraph::next(WorkflowNode::FormatResponse),
            Some(WorkflowNode::Done)
        );
    }

    #[test]
    fn test_failed_result_routes_to_generation() {
        let failures = vec![
            Message::tool(
                "call_1",
                "Error: Query failed. Please rewrite your query and try again.",
                ToolStatus::Error,
            ),
            Message::tool("call_1", "Error: relation does not exist", ToolStatus::Success),
            Message::tool("call_1", "permission denied", ToolStatus::Error),
        ];

        for failure in failures {
            assert_eq!(
                WorkflowGraph::route_after_execution(&executed(failure)),
                WorkflowNode::GenerateQuery
            );
        }
    }

    #[test]
    fn test_success_routes_to_formatting() {
        let successes = vec![
            Message::tool("call_1", "[('Alice', 'CA')]", ToolStatus::Success),
            Message::tool("call_1", "[('No Error: here',)]", ToolStatus::Success),
        ];

        for success in successes {
            assert_eq!(
                WorkflowGraph::route_after_execution(&executed(success)),
                WorkflowNode::FormatResponse
            );
        }
    }

    #[test]
    fn test_mermaid_has_dotted_branch() {
        let mermaid = WorkflowGraph::to_mermaid();

        assert!(mermaid.contains("__start__ --> seed;"));
        assert!(mermaid.contains("execute_query -.-> generate_query;"));
        assert!(mermaid.contains("execute_query -.-> format_response;"));
        assert!(mermaid.contains("format_response --> __end__;"));
        assert!(!mermaid.contains("execute_query --> "));
    }
}

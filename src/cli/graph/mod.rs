//! Graph command - prints the workflow graph

use crate::domain::agent::WorkflowGraph;

pub fn run() -> anyhow::Result<()> {
    println!("{}", WorkflowGraph::to_mermaid());
    Ok(())
}

//! CLI module for the SQL agent
//!
//! - `serve`: HTTP chat surface
//! - `ask`: answer one question in the terminal
//! - `graph`: print the workflow graph

pub mod ask;
pub mod graph;
pub mod serve;

use clap::{Parser, Subcommand};

/// SQL Agent - ask a relational database questions in plain language
#[derive(Parser)]
#[command(name = "pmp-sql-agent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server with the chat page
    Serve,

    /// Answer a single question and print every step
    Ask(ask::AskArgs),

    /// Print the workflow graph as Mermaid
    Graph,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["pmp-sql-agent", "ask", "How many customers?"]).unwrap();

        match cli.command {
            Command::Ask(args) => assert_eq!(args.question, "How many customers?"),
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["pmp-sql-agent", "ask"]).is_err());
    }

    #[test]
    fn test_parse_serve_and_graph() {
        assert!(matches!(
            Cli::try_parse_from(["pmp-sql-agent", "serve"]).unwrap().command,
            Command::Serve
        ));
        assert!(matches!(
            Cli::try_parse_from(["pmp-sql-agent", "graph"]).unwrap().command,
            Command::Graph
        ));
    }
}

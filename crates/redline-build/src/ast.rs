//! AST document produced by the front-end in `--ast` mode
//!
//! Only the statement shape matters to the build: the resolver filters the
//! statement sequence for imports. Node kinds the orchestrator has no use for
//! decode to [`Statement::Unknown`].

use serde::{Deserialize, Serialize};

/// Parsed module, as emitted by the front-end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ast {
    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// Top-level statement node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    /// `import "path"`
    Import { path: String },
    /// `val`/`var` binding
    Declaration {
        #[serde(default)]
        name: String,
    },
    FunctionDefinition {
        #[serde(default)]
        name: String,
    },
    If,
    Print,
    Return,
    #[serde(other)]
    Unknown,
}

impl Ast {
    /// Decode the front-end's JSON output
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Import references in statement order
    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Import { path } => Some(path.as_str()),
            _ => None,
        })
    }
}

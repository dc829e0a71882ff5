//! Program loading
//!
//! Programs are stored as RON documents describing an already-parsed
//! [`ast::Program`]. This module reads them and checks that the declarations
//! are consistent before anything runs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub mod ast;

use ast::{Program, Stmt};

/// Program loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("Duplicate function: {0}")]
    DuplicateFunction(String),

    #[error("Method {method} belongs to undeclared struct {owner}")]
    UnknownOwner { method: String, owner: String },
}

/// Parse a RON program and validate its declarations.
pub fn parse_program(source: &str) -> Result<Program, LoadError> {
    debug!("Parsing program ({} bytes)", source.len());
    let program: Program = ron::from_str(source)?;
    validate(&program)?;
    debug!(
        "Parsed {} functions, {} structs, {} main statements",
        program.functions.len(),
        program.structs.len(),
        program.main.len()
    );
    Ok(program)
}

/// Read and parse a RON program file.
pub fn load_program(path: &Path) -> Result<Program, LoadError> {
    let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_program(&source)
}

fn validate(program: &Program) -> Result<(), LoadError> {
    let structs: HashSet<&str> = program.structs.iter().map(|s| s.name.as_str()).collect();
    let mut seen = HashSet::new();
    for func in &program.functions {
        let name = func.qualified_name();
        if let Some(owner) = &func.owner {
            if !structs.contains(owner.as_str()) {
                return Err(LoadError::UnknownOwner {
                    method: func.name.clone(),
                    owner: owner.clone(),
                });
            }
        }
        if !seen.insert(name.clone()) {
            return Err(LoadError::DuplicateFunction(name));
        }
    }
    Ok(())
}

/// Static overview of a program, reported by `cbloop check`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramSummary {
    pub structs: usize,
    pub functions: usize,
    pub async_functions: usize,
    /// Async functions without an explicit `yield` (their loops auto-suspend)
    pub auto_yield_functions: usize,
    pub main_statements: usize,
    /// Statements across all bodies, nested ones included
    pub total_statements: usize,
}

impl ProgramSummary {
    pub fn of(program: &Program) -> Self {
        let async_fns = program.functions.iter().filter(|f| f.is_async);
        Self {
            structs: program.structs.len(),
            functions: program.functions.len(),
            async_functions: async_fns.clone().count(),
            auto_yield_functions: async_fns.filter(|f| !f.has_yield()).count(),
            main_statements: program.main.len(),
            total_statements: count_statements(&program.main)
                + program
                    .functions
                    .iter()
                    .map(|f| count_statements(&f.body))
                    .sum::<usize>(),
        }
    }
}

fn count_statements(stmts: &[Stmt]) -> usize {
    stmts
        .iter()
        .map(|stmt| {
            1 + match stmt {
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => count_statements(then_branch) + count_statements(else_branch),
                Stmt::While { body, .. } | Stmt::Block(body) => count_statements(body),
                Stmt::For { body, .. } => count_statements(body),
                _ => 0,
            }
        })
        .sum()
}

#[cfg(test)]
mod tests;

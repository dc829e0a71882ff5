//! Abstract Syntax Tree types
//!
//! The tree the interpreter walks. Programs arrive already parsed, serialized
//! as RON (see [`crate::frontend::parse_program`]).

use serde::{Deserialize, Serialize};

use crate::runtime::value::Value;

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value
    Lit(Value),
    /// Variable reference (may be a flattened dotted name)
    Var(String),
    /// Field access `base.name`
    Field(Box<Expr>, String),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnOp {
        op: UnOp,
        expr: Box<Expr>,
    },
    /// Struct literal `Type { a: .., b: .. }`
    StructLit {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    /// Free function call
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// Method call on a variable: `receiver.method(args)`
    MethodCall {
        receiver: String,
        method: String,
        args: Vec<Expr>,
    },
    /// `await expr`
    Await(Box<Expr>),
    /// `sleep(ms)` - yields a Future that resolves after `ms`
    Sleep(Box<Expr>),
    /// `timeout(future, ms)` - arms a deadline on the future's task
    Timeout {
        future: Box<Expr>,
        millis: Box<Expr>,
    },
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name = value`
    Let { name: String, value: Expr },
    /// `target = value`, target may be a dotted path like `self.count`
    Assign { target: String, value: Expr },
    Expr(Expr),
    Print(Expr),
    Return(Option<Expr>),
    /// Explicit suspend point
    Yield,
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        #[serde(default)]
        else_branch: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    For {
        #[serde(default)]
        init: Option<Box<Stmt>>,
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    Break,
    Continue,
}

impl Stmt {
    /// Recursively check for an explicit `yield`
    pub fn contains_yield(&self) -> bool {
        match self {
            Stmt::Yield => true,
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => contains_yield(then_branch) || contains_yield(else_branch),
            Stmt::While { body, .. } | Stmt::Block(body) => contains_yield(body),
            Stmt::For {
                init, update, body, ..
            } => {
                init.as_deref().is_some_and(Stmt::contains_yield)
                    || update.as_deref().is_some_and(Stmt::contains_yield)
                    || contains_yield(body)
            }
            _ => false,
        }
    }
}

/// Recursively check a statement list for an explicit `yield`
pub fn contains_yield(stmts: &[Stmt]) -> bool {
    stmts.iter().any(Stmt::contains_yield)
}

/// Function (or method) declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub is_async: bool,
    /// Owning struct type for methods
    #[serde(default)]
    pub owner: Option<String>,
}

impl FunctionDecl {
    /// Lookup key: `name` for functions, `Owner.name` for methods
    pub fn qualified_name(&self) -> String {
        match &self.owner {
            Some(owner) => format!("{}.{}", owner, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether the body has an explicit suspend point
    pub fn has_yield(&self) -> bool {
        contains_yield(&self.body)
    }
}

/// Struct declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A whole program
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub structs: Vec<StructDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    #[serde(default)]
    pub main: Vec<Stmt>,
}

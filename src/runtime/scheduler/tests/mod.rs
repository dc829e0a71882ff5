//! Scheduler tests, driven through the tree-walking interpreter

mod stepping;

use std::sync::Arc;

use crate::backends::interpreter::Interpreter;
use crate::backends::InterpreterConfig;
use crate::frontend::ast::{BinOp, Expr, FunctionDecl, Stmt};
use crate::runtime::scheduler::{Scheduler, SchedulerConfig};
use crate::runtime::value::Value;

pub(super) fn quiet_interpreter() -> Interpreter {
    Interpreter::with_config(InterpreterConfig {
        echo_output: false,
        ..InterpreterConfig::default()
    })
}

pub(super) fn scheduler() -> Scheduler {
    Scheduler::with_config(SchedulerConfig {
        idle_backoff_ms: 1,
        trace_steps: true,
    })
}

pub(super) fn func(
    name: &str,
    params: &[&str],
    body: Vec<Stmt>,
) -> Arc<FunctionDecl> {
    Arc::new(FunctionDecl {
        name: name.to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
        body,
        is_async: true,
        owner: None,
    })
}

pub(super) fn int(i: i64) -> Expr {
    Expr::Lit(Value::Int(i))
}

pub(super) fn var(name: &str) -> Expr {
    Expr::Var(name.to_string())
}

pub(super) fn bin(
    op: BinOp,
    left: Expr,
    right: Expr,
) -> Expr {
    Expr::BinOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub(super) fn print(text: &str) -> Stmt {
    Stmt::Print(Expr::Lit(Value::str(text)))
}

pub(super) fn let_(
    name: &str,
    value: Expr,
) -> Stmt {
    Stmt::Let {
        name: name.to_string(),
        value,
    }
}

pub(super) fn assign(
    target: &str,
    value: Expr,
) -> Stmt {
    Stmt::Assign {
        target: target.to_string(),
        value,
    }
}

pub(super) fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(value))
}

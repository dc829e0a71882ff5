//! Registration, round-robin stepping and completion

use super::*;
use crate::backends::StatementExecutor;
use crate::frontend::ast::{BinOp, Stmt};
use crate::runtime::errors::RuntimeError;
use crate::runtime::scheduler::{Future, StepStatus, TaskId, TaskState};
use crate::runtime::value::{Value, ValueKind};

#[test]
fn test_register_assigns_ids_and_auto_yield() {
    let mut s = scheduler();
    let plain = s.spawn(func("plain", &[], vec![print("x")]), vec![]);
    let yielding = s.spawn(func("yielding", &[], vec![Stmt::Block(vec![Stmt::Yield])]), vec![]);

    assert_eq!(plain, TaskId(0));
    assert_eq!(yielding, TaskId(1));
    assert!(s.get_task(plain).unwrap().auto_yield());
    assert!(!s.get_task(yielding).unwrap().auto_yield());
    assert_eq!(s.get_task(plain).unwrap().state(), TaskState::NotStarted);
    assert_eq!(s.task_count(), 2);
    assert_eq!(s.pending_count(), 2);
    assert!(s.has_tasks());
    assert_eq!(s.stats().tasks_registered, 2);
}

#[test]
fn test_two_statement_body_finishes_in_two_steps() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let body = vec![
        let_("x", int(40)),
        ret(bin(BinOp::Add, var("x"), int(2))),
    ];
    let id = s.spawn(func("answer", &[], body), vec![]);

    s.run(&mut interp).unwrap();

    let task = s.get_task(id).unwrap();
    assert!(task.auto_yield());
    assert!(task.is_executed());
    assert_eq!(task.steps(), 2);
    assert!(task.future().is_ready);
    assert_eq!(task.future().value, Value::Int(42));
    assert_eq!(s.stats().steps_executed, 2);
    assert_eq!(s.stats().tasks_completed, 1);
    assert!(s.is_empty());
}

#[test]
fn test_round_robin_interleaves_tasks() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    for name in ["a", "b", "c"] {
        let body = (1..=2).map(|i| print(&format!("{}{}", name, i))).collect();
        s.spawn(func(name, &[], body), vec![]);
    }

    s.run(&mut interp).unwrap();

    assert_eq!(interp.output(), ["a1", "b1", "c1", "a2", "b2", "c2"]);
    assert!(s.tasks().all(|t| t.is_executed()));
}

#[test]
fn test_loop_reenters_same_statement() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let body = vec![
        let_("i", int(0)),
        Stmt::While {
            condition: bin(BinOp::Lt, var("i"), int(3)),
            body: vec![assign("i", bin(BinOp::Add, var("i"), int(1)))],
        },
    ];
    let id = s.spawn(func("count", &[], body), vec![]);

    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Pending);
    for expected in 1..=3 {
        assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Pending);
        let task = s.get_task(id).unwrap();
        assert_eq!(task.current_statement_index(), 1);
        assert_eq!(task.scope().unwrap().get("i"), Some(&Value::Int(expected)));
    }
    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Done);
    assert_eq!(s.get_task(id).unwrap().steps(), 5);
}

#[test]
fn test_trailing_yield_completes_on_the_next_step() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let id = s.spawn(func("tail", &[], vec![print("a"), Stmt::Yield]), vec![]);

    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Pending);
    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Pending);
    let task = s.get_task(id).unwrap();
    assert!(!task.is_executed());
    assert!(!task.future().is_ready);
    assert_eq!(task.current_statement_index(), 2);

    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Done);
    let task = s.get_task(id).unwrap();
    assert!(task.is_executed());
    assert_eq!(task.steps(), 2);
    assert_eq!(interp.output(), ["a"]);
}

#[test]
fn test_restepping_finished_task_is_noop() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let id = s.spawn(func("one", &[], vec![ret(int(1))]), vec![]);
    s.run(&mut interp).unwrap();

    let status = s.execute_one_step(id, &mut interp).unwrap();
    assert_eq!(status, StepStatus::Done);
    assert!(!status.is_pending());
    let task = s.get_task(id).unwrap();
    assert_eq!(task.result(), Some(&Value::Int(1)));
    assert_eq!(task.steps(), 1);
}

#[test]
fn test_unknown_task_is_done() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    assert_eq!(s.execute_one_step(TaskId(99), &mut interp).unwrap(), StepStatus::Done);
}

#[test]
fn test_return_skips_remaining_statements() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let id = s.spawn(func("early", &[], vec![ret(int(1)), print("never")]), vec![]);

    s.run(&mut interp).unwrap();

    assert!(interp.output().is_empty());
    let task = s.get_task(id).unwrap();
    assert_eq!(task.current_statement_index(), 0);
    assert_eq!(task.result(), Some(&Value::Int(1)));
}

#[test]
fn test_empty_body_finishes_void() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let id = s.spawn(func("empty", &[], vec![]), vec![]);

    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Done);
    let task = s.get_task(id).unwrap();
    assert_eq!(task.future().value, Value::Void);
    assert!(task.future().is_ready);
}

#[test]
fn test_fault_propagates_and_restores_executor() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let body = vec![let_("x", int(1)), Stmt::Print(var("missing"))];
    let id = s.spawn(func("broken", &[], body), vec![]);
    s.spawn(func("bystander", &[], vec![print("b")]), vec![]);

    let err = s.run(&mut interp).unwrap_err();

    assert_eq!(err, RuntimeError::UndefinedVariable("missing".to_string()));
    assert_eq!(interp.current_task_id(), None);
    assert!(!interp.auto_yield_mode());
    assert_eq!(interp.scope_depth(), 1);
    assert_eq!(s.active_task(), None);
    let task = s.get_task(id).unwrap();
    assert!(!task.is_executed());
    assert_eq!(task.current_statement_index(), 1);
}

#[test]
fn test_break_outside_loop_is_a_fault() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    s.spawn(func("stray", &[], vec![Stmt::Break]), vec![]);

    let err = s.run(&mut interp).unwrap_err();
    assert_eq!(err, RuntimeError::StrayControl("break"));
}

#[test]
fn test_returned_future_is_unwrapped() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    let inner = Future::ready(Value::Int(5)).to_value(None);
    let id = s.spawn(func("forward", &["f"], vec![ret(var("f"))]), vec![inner.clone()]);

    s.run(&mut interp).unwrap();

    let task = s.get_task(id).unwrap();
    assert_eq!(task.result(), Some(&inner));
    assert_eq!(task.future().value, Value::Int(5));
    assert!(task.future().is_ready);
}

#[test]
fn test_nested_cycle_skips_running_task() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    interp.define_function(FunctionDecl {
        name: "pump".to_string(),
        params: vec![],
        body: vec![Stmt::Yield],
        is_async: false,
        owner: None,
    });
    let call = Stmt::Expr(Expr::Call {
        name: "pump".to_string(),
        args: vec![],
    });
    let id = s.spawn(func("outer", &[], vec![call]), vec![]);

    // Stepping directly leaves the id queued, so the pump inside the step
    // dequeues the very task that is running.
    assert_eq!(s.execute_one_step(id, &mut interp).unwrap(), StepStatus::Done);
    assert_eq!(s.get_task(id).unwrap().steps(), 1);
    assert_eq!(s.pending_count(), 1);
    assert!(s.is_queued(id));
}

#[test]
fn test_direct_step_awaiting_itself_stalls() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    interp.set_global("me", Future::pending().to_value(Some(TaskId(0))));
    let await_me = Expr::Await(Box::new(var("me")));
    let id = s.spawn(func("selfish", &[], vec![ret(await_me)]), vec![]);

    // The only queued task is the one running, so the await gives up
    // instead of cycling forever.
    let err = s.execute_one_step(id, &mut interp).unwrap_err();

    assert_eq!(err, RuntimeError::AwaitStalled(id));
    assert!(s.is_queued(id));
    assert_eq!(s.active_task(), None);
    assert!(!s.get_task(id).unwrap().is_waiting());
}

#[test]
fn test_summaries_follow_registration_order() {
    let mut s = scheduler();
    let mut interp = quiet_interpreter();
    s.spawn(func("first", &[], vec![ret(int(1))]), vec![]);
    s.spawn(func("second", &[], vec![print("x"), print("y")]), vec![]);
    s.run(&mut interp).unwrap();

    let summaries = s.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].name, "first");
    assert_eq!(summaries[0].state, TaskState::Finished);
    assert_eq!(summaries[0].result, Some(Value::Int(1)));
    assert_eq!(summaries[0].result_kind, Some(ValueKind::Int));
    assert_eq!(summaries[1].steps, 2);
    assert_eq!(summaries[1].result_kind, Some(ValueKind::Void));
    assert!(summaries.iter().all(|t| t.is_ready));
}

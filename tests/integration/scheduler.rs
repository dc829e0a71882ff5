//! Scheduler properties through the public API

use std::sync::Arc;

use cbloop::backends::interpreter::Interpreter;
use cbloop::backends::InterpreterConfig;
use cbloop::frontend::ast::{Expr, FunctionDecl, Stmt};
use cbloop::runtime::scheduler::{Scheduler, SchedulerConfig, TaskState};
use cbloop::runtime::Value;
use proptest::prelude::*;

fn printer(
    name: String,
    steps: usize,
) -> Arc<FunctionDecl> {
    let body = (0..steps)
        .map(|i| Stmt::Print(Expr::Lit(Value::Str(format!("{}:{}", name, i)))))
        .collect();
    Arc::new(FunctionDecl {
        name,
        params: vec![],
        body,
        is_async: true,
        owner: None,
    })
}

fn quiet_interpreter() -> Interpreter {
    Interpreter::with_config(InterpreterConfig {
        echo_output: false,
        ..InterpreterConfig::default()
    })
}

proptest! {
    #[test]
    fn prop_round_robin_finishes_every_task(tasks in 1usize..6, steps in 1usize..5) {
        let mut scheduler = Scheduler::with_config(SchedulerConfig {
            idle_backoff_ms: 0,
            trace_steps: false,
        });
        let mut interp = quiet_interpreter();
        for t in 0..tasks {
            scheduler.spawn(printer(format!("t{}", t), steps), vec![]);
        }

        scheduler.run(&mut interp).unwrap();

        prop_assert!(scheduler.is_empty());
        prop_assert!(scheduler.tasks().all(|t| t.state() == TaskState::Finished && t.steps() == steps));
        prop_assert_eq!(scheduler.stats().steps_executed, tasks * steps);
        prop_assert_eq!(scheduler.stats().tasks_completed, tasks);

        let expected: Vec<String> = (0..steps)
            .flat_map(|i| (0..tasks).map(move |t| format!("t{}:{}", t, i)))
            .collect();
        prop_assert_eq!(interp.output(), expected.as_slice());
    }
}

#[test]
fn test_sleep_orders_wakeups() {
    let mut scheduler = Scheduler::new();
    let mut interp = quiet_interpreter();
    let slow = scheduler.spawn_timer(std::time::Duration::from_millis(30));
    let fast = scheduler.spawn_timer(std::time::Duration::from_millis(5));

    scheduler.run_until_complete(fast, &mut interp).unwrap();

    assert!(scheduler.is_task_finished(fast));
    assert!(!scheduler.is_task_finished(slow));
    scheduler.run(&mut interp).unwrap();
    assert!(scheduler.is_task_finished(slow));
}

#[test]
fn test_task_ids_are_never_reused() {
    let mut scheduler = Scheduler::new();
    let mut interp = quiet_interpreter();
    let first = scheduler.spawn(printer("x".to_string(), 1), vec![]);
    scheduler.run(&mut interp).unwrap();
    let second = scheduler.spawn(printer("y".to_string(), 1), vec![]);

    assert!(second > first);
    assert_eq!(scheduler.task_count(), 2);
}

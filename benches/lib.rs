//! # cbloop benchmarks
//!
//! Criterion benchmarks for the cooperative scheduler.
//!
//! ## Groups
//! - `scheduler`: raw stepping of many small tasks
//! - `programs`: whole RON programs through the interpreter
//!
//! ## Usage
//! ```bash
//! cargo bench              # run everything
//! cargo bench scheduler    # only the scheduler group
//! ```

use std::hint::black_box;
use std::sync::Arc;

use cbloop::backends::interpreter::Interpreter;
use cbloop::backends::InterpreterConfig;
use cbloop::frontend::ast::{Expr, FunctionDecl, Stmt};
use cbloop::runtime::scheduler::Scheduler;
use cbloop::runtime::Value;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn quiet_interpreter() -> Interpreter {
    Interpreter::with_config(InterpreterConfig {
        echo_output: false,
        ..InterpreterConfig::default()
    })
}

fn counting_body(steps: i64) -> Arc<FunctionDecl> {
    let body = (0..steps)
        .map(|i| Stmt::Let {
            name: "x".to_string(),
            value: Expr::Lit(Value::Int(i)),
        })
        .collect();
    Arc::new(FunctionDecl {
        name: "count".to_string(),
        params: vec![],
        body,
        is_async: true,
        owner: None,
    })
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_round_robin(c: &mut Criterion) {
    let mut group = c.benchmark_group("round_robin");
    let body = counting_body(10);
    for tasks in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                let mut scheduler = Scheduler::new();
                let mut interp = quiet_interpreter();
                for _ in 0..tasks {
                    scheduler.spawn(Arc::clone(&body), vec![]);
                }
                scheduler.run(&mut interp).unwrap();
                black_box(scheduler.stats().steps_executed)
            })
        });
    }
    group.finish();
}

// ============================================================================
// Program Benchmarks
// ============================================================================

const LOOPS: &str = r#"(
    functions: [(
        name: "spin",
        params: ["n"],
        is_async: true,
        body: [
            While(condition: BinOp(op: Gt, left: Var("n"), right: Lit(Int(0))), body: [
                Assign(target: "n", value: BinOp(op: Sub, left: Var("n"), right: Lit(Int(1)))),
            ]),
            Return(Some(Var("n"))),
        ],
    )],
    main: [
        Let(name: "a", value: Call(name: "spin", args: [Lit(Int(200))])),
        Let(name: "b", value: Call(name: "spin", args: [Lit(Int(200))])),
        Expr(Await(Var("a"))),
        Expr(Await(Var("b"))),
    ],
)"#;

const AWAIT_CHAIN: &str = r#"(
    functions: [
        (name: "leaf", params: ["v"], is_async: true, body: [Return(Some(Var("v")))]),
        (name: "mid", params: ["v"], is_async: true, body: [
            Return(Some(BinOp(op: Add, left: Await(Call(name: "leaf", args: [Var("v")])), right: Lit(Int(1))))),
        ]),
    ],
    main: [
        For(
            init: Some(Let(name: "i", value: Lit(Int(0)))),
            condition: Some(BinOp(op: Lt, left: Var("i"), right: Lit(Int(100)))),
            update: Some(Assign(target: "i", value: BinOp(op: Add, left: Var("i"), right: Lit(Int(1))))),
            body: [Expr(Await(Call(name: "mid", args: [Var("i")])))],
        ),
    ],
)"#;

fn bench_auto_yield_loops(c: &mut Criterion) {
    c.bench_function("auto_yield_loops", |b| {
        b.iter(|| black_box(cbloop::run_source(LOOPS).unwrap()))
    });
}

fn bench_await_chain(c: &mut Criterion) {
    c.bench_function("await_chain_100", |b| {
        b.iter(|| black_box(cbloop::run_source(AWAIT_CHAIN).unwrap()))
    });
}

// ============================================================================
// Criterion Groups
// ============================================================================

criterion_group!(
    name = scheduler;
    config = Criterion::default().sample_size(30);
    targets = bench_round_robin
);

criterion_group!(
    name = programs;
    config = Criterion::default().sample_size(20);
    targets = bench_auto_yield_loops, bench_await_chain
);

criterion_main!(scheduler, programs);

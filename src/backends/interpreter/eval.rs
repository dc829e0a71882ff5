//! Expression evaluation and calls

use std::time::Duration;

use tracing::{debug, trace};

use super::Interpreter;
use crate::frontend::ast::{BinOp, Expr, FunctionDecl, UnOp};
use crate::runtime::errors::{RuntimeError, RuntimeResult};
use crate::runtime::scheduler::{AsyncTask, BindingSite, Future, Scheduler};
use crate::runtime::scope::Scope;
use crate::runtime::signal::{ExecResult, Signal};
use crate::runtime::value::{StructValue, Value};

impl Interpreter {
    pub(super) fn eval(
        &mut self,
        expr: &Expr,
        scheduler: &mut Scheduler,
    ) -> ExecResult<Value> {
        match expr {
            Expr::Lit(value) => Ok(value.clone()),
            Expr::Var(name) => Ok(self.lookup_var(name)?),
            Expr::Field(base, name) => {
                let base = self.eval(base, scheduler)?;
                let fields = base.as_struct().ok_or_else(|| {
                    RuntimeError::TypeError(format!("cannot read field `{}` of {}", name, base.type_name()))
                })?;
                let value = fields
                    .field(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::FieldNotFound(format!("{}.{}", fields.type_name, name)))?;
                Ok(value)
            }
            Expr::BinOp { op, left, right } => self.eval_binop(*op, left, right, scheduler),
            Expr::UnOp { op, expr } => {
                let value = self.eval(expr, scheduler)?;
                Ok(unary(*op, &value)?)
            }
            Expr::StructLit { type_name, fields } => self.eval_struct_lit(type_name, fields, scheduler),
            Expr::Call { name, args } => self.call_function(name, args, scheduler),
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => self.call_method(receiver, method, args, scheduler),
            Expr::Await(expr) => self.eval_await(expr, scheduler),
            Expr::Sleep(millis) => {
                let duration = self.eval_millis(millis, scheduler)?;
                let id = scheduler.spawn_timer(duration);
                Ok(scheduler.future_value(id)?)
            }
            Expr::Timeout { future, millis } => {
                let future = self.eval(future, scheduler)?;
                let id = Future::task_id_of(&future)
                    .ok_or_else(|| RuntimeError::NotAwaitable(future.type_name().to_string()))?;
                if scheduler.get_task(id).is_none() {
                    return Err(RuntimeError::UnknownTask(id).into());
                }
                let duration = self.eval_millis(millis, scheduler)?;
                scheduler.set_timeout(id, duration);
                Ok(future)
            }
        }
    }

    /// Resolve a name: the binding itself first (flattened dotted names
    /// included), then a field path through the base aggregate.
    pub(super) fn lookup_var(
        &self,
        name: &str,
    ) -> RuntimeResult<Value> {
        if let Some(value) = self.scopes.lookup(name) {
            return Ok(value.clone());
        }
        let Some((base, path)) = name.split_once('.') else {
            return Err(RuntimeError::UndefinedVariable(name.to_string()));
        };
        let mut value = self
            .scopes
            .lookup(base)
            .ok_or_else(|| RuntimeError::UndefinedVariable(base.to_string()))?;
        for segment in path.split('.') {
            value = value
                .field(segment)
                .ok_or_else(|| RuntimeError::FieldNotFound(name.to_string()))?;
        }
        Ok(value.clone())
    }

    fn eval_binop(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        scheduler: &mut Scheduler,
    ) -> ExecResult<Value> {
        let lhs = self.eval(left, scheduler)?;
        match op {
            BinOp::And | BinOp::Or => {
                let l = truthy(&lhs)?;
                if (op == BinOp::And && !l) || (op == BinOp::Or && l) {
                    return Ok(Value::Bool(l));
                }
                let rhs = self.eval(right, scheduler)?;
                Ok(Value::Bool(truthy(&rhs)?))
            }
            _ => {
                let rhs = self.eval(right, scheduler)?;
                Ok(binary(op, &lhs, &rhs)?)
            }
        }
    }

    fn eval_struct_lit(
        &mut self,
        type_name: &str,
        fields: &[(String, Expr)],
        scheduler: &mut Scheduler,
    ) -> ExecResult<Value> {
        let mut evaluated = Vec::with_capacity(fields.len());
        for (name, expr) in fields {
            evaluated.push((name.clone(), self.eval(expr, scheduler)?));
        }

        let mut value = StructValue::new(type_name);
        match self.structs.get(type_name) {
            Some(decl) => {
                for (name, _) in &evaluated {
                    if !decl.fields.contains(name) {
                        return Err(RuntimeError::FieldNotFound(format!("{}.{}", type_name, name)).into());
                    }
                }
                for field in &decl.fields {
                    let init = evaluated
                        .iter()
                        .find(|(name, _)| name == field)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default();
                    value.set_field(field.clone(), init);
                }
            }
            None => {
                for (name, init) in evaluated {
                    value.set_field(name, init);
                }
            }
        }
        Ok(Value::Struct(value))
    }

    fn eval_args(
        &mut self,
        args: &[Expr],
        scheduler: &mut Scheduler,
    ) -> ExecResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, scheduler)?);
        }
        Ok(values)
    }

    fn eval_millis(
        &mut self,
        millis: &Expr,
        scheduler: &mut Scheduler,
    ) -> ExecResult<Duration> {
        let value = self.eval(millis, scheduler)?;
        let ms = value.to_int().ok_or_else(|| {
            RuntimeError::TypeError(format!("duration must be an integer, found {}", value.type_name()))
        })?;
        Ok(Duration::from_millis(ms.max(0) as u64))
    }

    fn call_function(
        &mut self,
        name: &str,
        args: &[Expr],
        scheduler: &mut Scheduler,
    ) -> ExecResult<Value> {
        let func = self
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedFunction(name.to_string()))?;
        let args = self.eval_args(args, scheduler)?;
        check_arity(&func, &args)?;

        if func.is_async {
            let id = scheduler.spawn(func, args);
            return Ok(scheduler.future_value(id)?);
        }
        let (value, _) = self.call_sync(&func, args, None, scheduler)?;
        Ok(value)
    }

    fn call_method(
        &mut self,
        receiver: &str,
        method: &str,
        args: &[Expr],
        scheduler: &mut Scheduler,
    ) -> ExecResult<Value> {
        let this = self.lookup_var(receiver)?;
        let type_name = this
            .as_struct()
            .map(|s| s.type_name.clone())
            .ok_or_else(|| {
                RuntimeError::TypeError(format!("cannot call `{}` on {}", method, this.type_name()))
            })?;
        let qualified = format!("{}.{}", type_name, method);
        let func = self
            .functions
            .get(&qualified)
            .cloned()
            .ok_or(RuntimeError::UndefinedFunction(qualified))?;
        let args = self.eval_args(args, scheduler)?;
        check_arity(&func, &args)?;

        if func.is_async {
            let site = BindingSite::resolve(&*self, receiver);
            let task = AsyncTask::new(func, args).with_receiver(this, site);
            let id = scheduler.register_task(task);
            return Ok(scheduler.future_value(id)?);
        }

        let (value, updated) = self.call_sync(&func, args, Some(this), scheduler)?;
        if let Some(updated) = updated {
            self.write_back_receiver(receiver, updated)?;
        }
        Ok(value)
    }

    /// Run a function body to completion in a fresh scope.
    ///
    /// The body runs outside of any task context: auto-yield is off, `yield`
    /// pumps the scheduler and statement positions start empty. Returns the
    /// result and, for methods, the final `self`.
    pub(super) fn call_sync(
        &mut self,
        func: &FunctionDecl,
        args: Vec<Value>,
        receiver: Option<Value>,
        scheduler: &mut Scheduler,
    ) -> ExecResult<(Value, Option<Value>)> {
        let max = self.config.max_call_depth;
        if self.call_depth >= max {
            return Err(RuntimeError::CallDepthExceeded(max).into());
        }
        trace!(function = %func.qualified_name(), depth = self.call_depth, "call");

        let mut scope = Scope::new();
        for (param, arg) in func.params.iter().zip(args) {
            scope.define(param.clone(), arg);
        }
        let has_receiver = receiver.is_some();
        if let Some(this) = receiver {
            if let Some(fields) = this.as_struct() {
                for (name, value) in &fields.fields {
                    scope.define(format!("self.{}", name), value.clone());
                }
            }
            scope.define("self", this);
        }

        let depth = self.scopes.depth();
        self.scopes.push_scope(scope);
        let saved_task = self.current_task.take();
        let saved_auto_yield = std::mem::replace(&mut self.auto_yield, false);
        let saved_positions = std::mem::take(&mut self.positions);
        self.call_depth += 1;

        let outcome = self.execute_block(&func.body, scheduler);

        self.call_depth -= 1;
        let updated = has_receiver.then(|| self.current_self());
        self.positions = saved_positions;
        self.auto_yield = saved_auto_yield;
        self.current_task = saved_task;
        self.scopes.truncate(depth);

        match outcome {
            Ok(()) => Ok((Value::Void, updated)),
            Err(Signal::Return(value)) => Ok((value, updated)),
            Err(other) => Err(Signal::Fault(other.into_fault())),
        }
    }

    /// `self` of the innermost scope with its flattened members merged in.
    fn current_self(&self) -> Value {
        let scope = self.scopes.current();
        let mut this = scope.get("self").cloned().unwrap_or_default();
        if let Some(fields) = this.as_struct_mut() {
            for (name, value) in scope.iter() {
                if let Some(member) = name.strip_prefix("self.") {
                    if !member.contains('.') {
                        fields.set_field(member, value.clone());
                    }
                }
            }
        }
        this
    }

    fn write_back_receiver(
        &mut self,
        receiver: &str,
        updated: Value,
    ) -> RuntimeResult<()> {
        if let Some(fields) = updated.as_struct() {
            for (name, value) in &fields.fields {
                self.scopes
                    .assign_existing(&format!("{}.{}", receiver, name), value.clone());
            }
        }
        self.assign(receiver, updated)
    }

    /// `await`: block until the Future's task is done, then read its value.
    fn eval_await(
        &mut self,
        expr: &Expr,
        scheduler: &mut Scheduler,
    ) -> ExecResult<Value> {
        let value = self.eval(expr, scheduler)?;
        let Some(id) = Future::task_id_of(&value) else {
            return match Future::from_value(&value) {
                Some(future) if future.is_ready => Ok(future.value),
                _ => Err(RuntimeError::NotAwaitable(value.type_name().to_string()).into()),
            };
        };
        if scheduler.get_task(id).is_none() {
            return Err(RuntimeError::UnknownTask(id).into());
        }

        if !scheduler.is_task_finished(id) {
            let current = self.current_task;
            debug!(awaiting = %id, by = ?current, "await");
            if let Some(current) = current {
                scheduler.wait_on(current, id);
            }
            let outcome = scheduler.run_until_complete(id, self);
            if let Some(current) = current {
                scheduler.clear_wait(current);
            }
            outcome?;
        }

        let task = scheduler.get_task(id).ok_or(RuntimeError::UnknownTask(id))?;
        if !task.future().is_ready {
            return Err(RuntimeError::AwaitStalled(id).into());
        }
        Ok(task.future().value.clone())
    }
}

fn check_arity(
    func: &FunctionDecl,
    args: &[Value],
) -> RuntimeResult<()> {
    if func.params.len() != args.len() {
        return Err(RuntimeError::ArityMismatch {
            name: func.qualified_name(),
            expected: func.params.len(),
            got: args.len(),
        });
    }
    Ok(())
}

fn truthy(value: &Value) -> RuntimeResult<bool> {
    value
        .to_bool()
        .ok_or_else(|| RuntimeError::TypeError(format!("expected bool, found {}", value.type_name())))
}

fn unary(
    op: UnOp,
    value: &Value,
) -> RuntimeResult<Value> {
    match (op, value) {
        (UnOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnOp::Not, v) => Ok(Value::Bool(!truthy(v)?)),
        (UnOp::Neg, v) => Err(RuntimeError::TypeError(format!("cannot negate {}", v.type_name()))),
    }
}

fn binary(
    op: BinOp,
    lhs: &Value,
    rhs: &Value,
) -> RuntimeResult<Value> {
    let mismatch = || {
        RuntimeError::TypeError(format!(
            "unsupported operands for {:?}: {} and {}",
            op,
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = match (lhs, rhs) {
                (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                    lhs.to_float() == rhs.to_float()
                }
                _ => lhs == rhs,
            };
            Ok(Value::Bool(equal == (op == BinOp::Eq)))
        }
        BinOp::Add if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) => {
            Ok(Value::Str(format!("{}{}", lhs, rhs)))
        }
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (lhs.to_float(), rhs.to_float()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(mismatch()),
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(result))
        }
        _ => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (Some(a), Some(b)) = (lhs.to_float(), rhs.to_float()) else {
                    return Err(mismatch());
                };
                float_arith(op, a, b).ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        },
    }
}

fn int_arith(
    op: BinOp,
    a: i64,
    b: i64,
) -> RuntimeResult<Value> {
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => return Err(RuntimeError::DivisionByZero),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        _ => {
            return Err(RuntimeError::TypeError(format!(
                "unsupported integer operator {:?}",
                op
            )))
        }
    };
    Ok(Value::Int(value))
}

fn float_arith(
    op: BinOp,
    a: f64,
    b: f64,
) -> Option<Value> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        _ => return None,
    };
    Some(Value::Float(value))
}

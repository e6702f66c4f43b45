// Tree-walking evaluator. Dispatches on atom kind, consults the scope chain
// for reads and writes and the registry for native calls. Every atom either
// produces exactly one Value or propagates the first error encountered;
// scopes pushed along the way are handles that unwind with `?`.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BinOp, CompiledExpression, Node, Qualifier, UnOp};
use crate::error::EvalError;
use crate::functions::Registry;
use crate::scope::{assignable, Context};
use crate::value::{format_number, to_int32, Closure, Function, Value};

/// Default cap on the element count a range expression may produce.
pub const DEFAULT_MAX_RANGE: usize = 1000;
/// Default cap on evaluation recursion depth.
pub const DEFAULT_MAX_DEPTH: usize = 256;

pub struct Evaluator<'r> {
    registry: &'r Registry,
    max_range_len: usize,
    max_depth: usize,
    depth: usize,
}

impl<'r> Evaluator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Evaluator {
            registry,
            max_range_len: DEFAULT_MAX_RANGE,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Override the range span cap.
    pub fn with_max_range(mut self, n: usize) -> Self {
        self.max_range_len = n;
        self
    }

    /// Override the recursion depth cap.
    pub fn with_max_depth(mut self, n: usize) -> Self {
        self.max_depth = n;
        self
    }

    /// Evaluate a compiled expression against a context chain.
    pub fn run(&mut self, ce: &CompiledExpression, ctx: &Context) -> Result<Value, EvalError> {
        self.eval(ce.root(), ctx)
    }

    pub fn eval(&mut self, node: &Node, ctx: &Context) -> Result<Value, EvalError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            self.depth -= 1;
            return Err(EvalError::TooDeep(self.max_depth));
        }
        let result = self.eval_node(node, ctx);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, node: &Node, ctx: &Context) -> Result<Value, EvalError> {
        match node {
            Node::Literal(v) => Ok(v.clone()),

            // Container literals construct a fresh identity per evaluation.
            Node::ArrayLit(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item, ctx)?);
                }
                Ok(Value::array(out))
            }

            Node::ObjectLit(pairs) => {
                let mut map = IndexMap::with_capacity(pairs.len());
                for (key_node, value_node) in pairs {
                    let key = match self.eval(key_node, ctx)? {
                        Value::String(s) => s.to_string(),
                        Value::Number(n) => format_number(n),
                        other => {
                            return Err(EvalError::Type(format!(
                                "object key must be a string, got {}",
                                other.type_name()
                            )))
                        }
                    };
                    let value = self.eval(value_node, ctx)?;
                    map.insert(key, value);
                }
                Ok(Value::object(map))
            }

            // Unresolved reads fall back to the host resolver, then Null;
            // they never raise.
            Node::VarRef(name) => match ctx.get_var(name) {
                Some(v) => Ok(v),
                None => Ok(ctx.resolve_external(name).unwrap_or(Value::Null)),
            },

            Node::Deref {
                scope,
                member,
                null_safe,
            } => {
                let base = self.eval(scope, ctx)?;
                if base.is_null() && *null_safe {
                    return Ok(Value::Null);
                }
                let member = self.eval(member, ctx)?;
                member_get(&base, &member)
            }

            Node::Unary { op, operand } => {
                let v = self.eval(operand, ctx)?;
                match op {
                    UnOp::Neg => match v.arith() {
                        Some(n) => Ok(Value::Number(-n)),
                        None => Err(EvalError::Type(format!(
                            "cannot negate a {}",
                            v.type_name()
                        ))),
                    },
                    UnOp::Not => Ok(Value::Bool(!v.truthy())),
                    UnOp::BitNot => Ok(Value::Number(!to_bits(&v) as f64)),
                }
            }

            Node::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, ctx),

            Node::List(items) => {
                let mut last = Value::Null;
                for item in items {
                    last = self.eval(item, ctx)?;
                }
                Ok(last)
            }

            Node::Block(items) => {
                let child = ctx.push(None);
                let mut last = Value::Null;
                for item in items {
                    last = self.eval(item, &child)?;
                }
                Ok(last)
            }

            Node::If {
                test,
                then,
                elifs,
                otherwise,
            } => {
                if self.eval(test, ctx)?.truthy() {
                    return self.eval(then, ctx);
                }
                for (elif_test, elif_body) in elifs {
                    if self.eval(elif_test, ctx)?.truthy() {
                        return self.eval(elif_body, ctx);
                    }
                }
                match otherwise {
                    Some(e) => self.eval(e, ctx),
                    None => Ok(Value::Null),
                }
            }

            Node::Case { whens, otherwise } => {
                for (test, body) in whens {
                    if self.eval(test, ctx)?.truthy() {
                        return self.eval(body, ctx);
                    }
                }
                match otherwise {
                    Some(e) => self.eval(e, ctx),
                    None => Ok(Value::Null),
                }
            }

            Node::Iterate {
                value_name,
                key_name,
                collection,
                body,
            } => {
                let coll = self.eval(collection, ctx)?;
                let pairs = normalize_collection(&coll);
                let child = ctx.push(None);
                let mut out = Vec::new();
                for (key, value) in pairs {
                    child.define_var(value_name, value);
                    if let Some(k) = key_name {
                        child.define_var(k, key);
                    }
                    let result = self.eval(body, &child)?;
                    // Null body results are dropped, not kept as placeholders.
                    if !result.is_null() {
                        out.push(result);
                    }
                }
                Ok(Value::array(out))
            }

            Node::Search {
                value_name,
                key_name,
                collection,
                predicate,
                result,
            } => {
                let coll = self.eval(collection, ctx)?;
                let pairs = normalize_collection(&coll);
                let child = ctx.push(None);
                for (key, value) in pairs {
                    child.define_var(value_name, value.clone());
                    if let Some(k) = key_name {
                        child.define_var(k, key);
                    }
                    if self.eval(predicate, &child)?.truthy() {
                        return match result {
                            Some(r) => self.eval(r, &child),
                            None => Ok(value),
                        };
                    }
                }
                Ok(Value::Null)
            }

            Node::Call { name, args } => self.eval_call(name, args, ctx),

            Node::FuncDef { name, params, body } => {
                let closure = Rc::new(Closure {
                    name: Rc::from(name.as_str()),
                    params: params.clone(),
                    body: Rc::clone(body),
                    scope: ctx.clone(),
                });
                ctx.define_function(name, Function::Closure(Rc::clone(&closure)));
                Ok(Value::Function(Function::Closure(closure)))
            }

            Node::Assign {
                target,
                value,
                qualifier,
            } => self.eval_assign(target, value, *qualifier, ctx),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Node,
        rhs: &Node,
        ctx: &Context,
    ) -> Result<Value, EvalError> {
        // Short-circuit forms first: the right operand only runs if needed,
        // and the result is the value of the deciding operand.
        match op {
            BinOp::And => {
                let l = self.eval(lhs, ctx)?;
                return if l.truthy() { self.eval(rhs, ctx) } else { Ok(l) };
            }
            BinOp::Or => {
                let l = self.eval(lhs, ctx)?;
                return if l.truthy() { Ok(l) } else { self.eval(rhs, ctx) };
            }
            BinOp::Coalesce => {
                let l = self.eval(lhs, ctx)?;
                return if l.is_null() { self.eval(rhs, ctx) } else { Ok(l) };
            }
            BinOp::NumCoalesce => {
                let l = self.eval(lhs, ctx)?;
                return match l.num() {
                    Some(n) if n.is_finite() => Ok(Value::Number(n)),
                    _ => self.eval(rhs, ctx),
                };
            }
            _ => {}
        }

        let l = self.eval(lhs, ctx)?;
        let r = self.eval(rhs, ctx)?;
        self.apply_binary(op, l, r)
    }

    fn apply_binary(&self, op: BinOp, l: Value, r: Value) -> Result<Value, EvalError> {
        match op {
            // `+` doubles as concatenation when either side is a string.
            BinOp::Add => {
                if l.is_string() || r.is_string() {
                    let mut s = l.to_text();
                    s.push_str(&r.to_text());
                    Ok(Value::string(s))
                } else {
                    let (a, b) = arith_pair(&l, &r, "+")?;
                    Ok(Value::Number(a + b))
                }
            }
            BinOp::Sub => {
                let (a, b) = arith_pair(&l, &r, "-")?;
                Ok(Value::Number(a - b))
            }
            BinOp::Mul => {
                let (a, b) = arith_pair(&l, &r, "*")?;
                Ok(Value::Number(a * b))
            }
            // IEEE semantics: division by zero yields an infinity or NaN.
            BinOp::Div => {
                let (a, b) = arith_pair(&l, &r, "/")?;
                Ok(Value::Number(a / b))
            }
            BinOp::Mod => {
                let (a, b) = arith_pair(&l, &r, "%")?;
                Ok(Value::Number(a % b))
            }
            BinOp::Pow => {
                let (a, b) = arith_pair(&l, &r, "**")?;
                Ok(Value::Number(a.powf(b)))
            }

            BinOp::Shl => Ok(Value::Number((to_bits(&l) << shift_count(&r)) as f64)),
            BinOp::Shr => Ok(Value::Number((to_bits(&l) >> shift_count(&r)) as f64)),
            BinOp::Ushr => Ok(Value::Number(
                ((to_bits(&l) as u32) >> shift_count(&r)) as f64,
            )),
            BinOp::BitAnd => Ok(Value::Number((to_bits(&l) & to_bits(&r)) as f64)),
            BinOp::BitXor => Ok(Value::Number((to_bits(&l) ^ to_bits(&r)) as f64)),
            BinOp::BitOr => Ok(Value::Number((to_bits(&l) | to_bits(&r)) as f64)),

            BinOp::Lt => Ok(Value::Bool(compare(&l, &r) == Some(Ordering::Less))),
            BinOp::Le => Ok(Value::Bool(matches!(
                compare(&l, &r),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ))),
            BinOp::Gt => Ok(Value::Bool(compare(&l, &r) == Some(Ordering::Greater))),
            BinOp::Ge => Ok(Value::Bool(matches!(
                compare(&l, &r),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ))),

            BinOp::Eq => Ok(Value::Bool(loose_eq(&l, &r))),
            BinOp::Ne => Ok(Value::Bool(!loose_eq(&l, &r))),
            BinOp::StrictEq => Ok(Value::Bool(strict_eq(&l, &r))),
            BinOp::StrictNe => Ok(Value::Bool(!strict_eq(&l, &r))),

            BinOp::In => match &r {
                Value::Object(map) => Ok(Value::Bool(map.borrow().contains_key(&l.to_text()))),
                // Positional test: true iff the left value is a valid,
                // present index. Not a value-membership test.
                Value::Array(arr) => {
                    let ok = match l.num() {
                        Some(n) if n.fract() == 0.0 && n >= 0.0 => {
                            (n as usize) < arr.borrow().len()
                        }
                        _ => false,
                    };
                    Ok(Value::Bool(ok))
                }
                other => Err(EvalError::Type(format!(
                    "'in' requires an array or object, got {}",
                    other.type_name()
                ))),
            },

            BinOp::Range => self.make_range(&l, &r),

            BinOp::And | BinOp::Or | BinOp::Coalesce | BinOp::NumCoalesce => {
                unreachable!("short-circuit operators are handled before operand evaluation")
            }
        }
    }

    /// `a..b`: an inclusive integer sequence, ascending or descending.
    /// Endpoints truncate toward zero; the total span is capped.
    fn make_range(&self, l: &Value, r: &Value) -> Result<Value, EvalError> {
        let (Value::Number(a), Value::Number(b)) = (l, r) else {
            return Err(EvalError::Type(format!(
                "range endpoints must be numbers, got {} and {}",
                l.type_name(),
                r.type_name()
            )));
        };
        if !a.is_finite() || !b.is_finite() {
            return Err(EvalError::Range("range endpoints must be finite".into()));
        }
        let start = a.trunc() as i64;
        let end = b.trunc() as i64;
        let span = start.abs_diff(end) + 1;
        if span > self.max_range_len as u64 {
            return Err(EvalError::Range(format!(
                "range of {} elements exceeds the maximum of {}",
                span, self.max_range_len
            )));
        }
        let values: Vec<Value> = if start <= end {
            (start..=end).map(|n| Value::Number(n as f64)).collect()
        } else {
            (end..=start)
                .rev()
                .map(|n| Value::Number(n as f64))
                .collect()
        };
        Ok(Value::array(values))
    }

    fn eval_assign(
        &mut self,
        target: &Node,
        value: &Node,
        qualifier: Qualifier,
        ctx: &Context,
    ) -> Result<Value, EvalError> {
        let val = self.eval(value, ctx)?;
        match target {
            Node::VarRef(name) => {
                if !assignable(name) {
                    return Err(EvalError::Syntax(format!("'{}' is a reserved name", name)));
                }
                match qualifier {
                    Qualifier::None => ctx.set_var(name, val.clone()),
                    Qualifier::Local => ctx.define_var(name, val.clone()),
                    Qualifier::Global => ctx.set_global(name, val.clone()),
                }
                Ok(val)
            }
            // Member assignment writes through the shared container,
            // visible to every holder of the reference.
            Node::Deref { scope, member, .. } => {
                let base = self.eval(scope, ctx)?;
                let member = self.eval(member, ctx)?;
                match &base {
                    Value::Object(map) => {
                        let key = member_key(&member)?;
                        map.borrow_mut().insert(key, val.clone());
                        Ok(val)
                    }
                    Value::Array(arr) => {
                        let idx = match member {
                            Value::Number(n) if n.fract() == 0.0 && n >= 0.0 => n as usize,
                            other => {
                                return Err(EvalError::Type(format!(
                                    "array index must be a non-negative integer, got {}",
                                    other.type_name()
                                )))
                            }
                        };
                        let mut arr = arr.borrow_mut();
                        if idx >= arr.len() {
                            arr.resize(idx + 1, Value::Null);
                        }
                        arr[idx] = val.clone();
                        Ok(val)
                    }
                    other => Err(EvalError::Type(format!(
                        "cannot assign a member of {}",
                        if other.is_null() { "null" } else { other.type_name() }
                    ))),
                }
            }
            _ => Err(EvalError::Syntax("invalid assignment target".into())),
        }
    }

    fn eval_call(&mut self, name: &str, args: &[Node], ctx: &Context) -> Result<Value, EvalError> {
        if let Some(func) = ctx.lookup_function(name) {
            let vals = self.eval_args(args, ctx)?;
            return self.invoke(&func, &vals, ctx);
        }
        // `sort` needs deferred, repeated evaluation of its comparator and
        // is a distinct evaluation path, not a registry entry.
        if name == "sort" {
            return self.eval_sort(args, ctx);
        }
        if let Some(native) = self.registry.lookup(name) {
            let vals = self.eval_args(args, ctx)?;
            return self.invoke_native(&native, &vals, ctx);
        }
        Err(EvalError::Reference(format!("undefined function: {}", name)))
    }

    fn eval_args(&mut self, args: &[Node], ctx: &Context) -> Result<Vec<Value>, EvalError> {
        let mut vals = Vec::with_capacity(args.len());
        for arg in args {
            vals.push(self.eval(arg, ctx)?);
        }
        Ok(vals)
    }

    fn invoke(&mut self, func: &Function, args: &[Value], ctx: &Context) -> Result<Value, EvalError> {
        match func {
            Function::Closure(closure) => self.invoke_closure(closure, args),
            Function::Native(native) => self.invoke_native(native, args, ctx),
        }
    }

    /// Invoke a user-defined function: push a child of the *defining* scope
    /// chain, bind parameters (missing trailing arguments bind Null), run the
    /// body, let the scope unwind.
    fn invoke_closure(&mut self, closure: &Closure, args: &[Value]) -> Result<Value, EvalError> {
        let scope = closure.scope.push(Some(&closure.name));
        for (i, param) in closure.params.iter().enumerate() {
            scope.define_var(param, args.get(i).cloned().unwrap_or(Value::Null));
        }
        self.eval(&closure.body, &scope)
    }

    fn invoke_native(
        &mut self,
        native: &Rc<crate::value::Native>,
        args: &[Value],
        ctx: &Context,
    ) -> Result<Value, EvalError> {
        if args.len() < native.min_args {
            return Err(EvalError::Reference(format!(
                "function {} requires at least {} argument{}",
                native.name,
                native.min_args,
                if native.min_args == 1 { "" } else { "s" }
            )));
        }
        (native.run)(ctx, args)
    }

    /// `sort(array)`, `sort(array, comparator_name)`, or
    /// `sort(array, expression-over-$1/$2)`. Sorts in place (same identity)
    /// and returns the array. A comparator result below zero puts `$1`
    /// first; a non-numeric result counts as zero, so a falsy sentinel
    /// leaves the order untouched.
    fn eval_sort(&mut self, args: &[Node], ctx: &Context) -> Result<Value, EvalError> {
        let Some(first) = args.first() else {
            return Err(EvalError::Reference(
                "function sort requires at least 1 argument".into(),
            ));
        };
        let arr_val = self.eval(first, ctx)?;
        let Value::Array(arr_rc) = &arr_val else {
            return Err(EvalError::Type(format!(
                "sort requires an array, got {}",
                arr_val.type_name()
            )));
        };

        let comparator = match args.get(1) {
            None => None,
            Some(Node::VarRef(name)) => match ctx
                .lookup_function(name)
                .or_else(|| self.registry.lookup(name).map(Function::Native))
            {
                Some(func) => Some(SortOrder::Func(func)),
                None => Some(SortOrder::Expr(&args[1])),
            },
            Some(node) => Some(SortOrder::Expr(node)),
        };

        let mut items = arr_rc.borrow().clone();
        let mut failure: Option<EvalError> = None;

        match comparator {
            None => items.sort_by(default_compare),
            Some(SortOrder::Func(func)) => {
                items.sort_by(|a, b| {
                    if failure.is_some() {
                        return Ordering::Equal;
                    }
                    match self.invoke(&func, &[a.clone(), b.clone()], ctx) {
                        Ok(v) => order_from(v.num().unwrap_or(0.0)),
                        Err(e) => {
                            failure = Some(e);
                            Ordering::Equal
                        }
                    }
                });
            }
            Some(SortOrder::Expr(node)) => {
                let scope = ctx.push(None);
                items.sort_by(|a, b| {
                    if failure.is_some() {
                        return Ordering::Equal;
                    }
                    scope.define_var("$1", a.clone());
                    scope.define_var("$2", b.clone());
                    match self.eval(node, &scope) {
                        Ok(v) => order_from(v.num().unwrap_or(0.0)),
                        Err(e) => {
                            failure = Some(e);
                            Ordering::Equal
                        }
                    }
                });
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        *arr_rc.borrow_mut() = items;
        Ok(arr_val.clone())
    }
}

enum SortOrder<'a> {
    Func(Function),
    Expr(&'a Node),
}

fn order_from(n: f64) -> Ordering {
    if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Default sort: numbers compare numerically, everything else by its text
/// rendering.
fn default_compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        _ => a.to_text().cmp(&b.to_text()),
    }
}

/// Bitwise operand coercion (32-bit, Null counts as 0).
fn to_bits(v: &Value) -> i32 {
    match v {
        Value::Null => 0,
        other => to_int32(other.num().unwrap_or(f64::NAN)),
    }
}

fn shift_count(v: &Value) -> u32 {
    (to_bits(v) as u32) & 31
}

fn arith_pair(l: &Value, r: &Value, op: &str) -> Result<(f64, f64), EvalError> {
    match (l.arith(), r.arith()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::Type(format!(
            "invalid operands for '{}': {} and {}",
            op,
            l.type_name(),
            r.type_name()
        ))),
    }
}

/// Relational comparison. Mixed number/string coerces the string; pairs with
/// no defined ordering compare as none (every relational test is false).
fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::String(_)) => a.partial_cmp(&r.num()?),
        (Value::String(_), Value::Number(b)) => l.num()?.partial_cmp(b),
        _ => None,
    }
}

/// Loose equality: a numeric string equals its numeric value; containers and
/// functions compare by identity; all other cross-type pairs are unequal.
pub(crate) fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::String(_)) => r.num().is_some_and(|b| *a == b),
        (Value::String(_), Value::Number(b)) => l.num().is_some_and(|a| a == *b),
        (Value::Array(_), Value::Array(_))
        | (Value::Object(_), Value::Object(_))
        | (Value::Function(_), Value::Function(_)) => l.same_ref(r),
        _ => false,
    }
}

/// Strict equality: identical type and value, no coercion.
pub(crate) fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(_), Value::Array(_))
        | (Value::Object(_), Value::Object(_))
        | (Value::Function(_), Value::Function(_)) => l.same_ref(r),
        _ => false,
    }
}

fn member_key(member: &Value) -> Result<String, EvalError> {
    match member {
        Value::String(s) => Ok(s.to_string()),
        Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Ok(format_number(*n)),
        other => Err(EvalError::Type(format!(
            "member must be a string or integer, got {}",
            other.type_name()
        ))),
    }
}

fn member_get(base: &Value, member: &Value) -> Result<Value, EvalError> {
    match base {
        Value::Object(map) => {
            let key = member_key(member)?;
            Ok(map.borrow().get(&key).cloned().unwrap_or(Value::Null))
        }
        Value::Array(arr) => match member {
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                let arr = arr.borrow();
                if *n >= 0.0 && (*n as usize) < arr.len() {
                    Ok(arr[*n as usize].clone())
                } else {
                    Ok(Value::Null)
                }
            }
            // A string member on an array is a missing key, not an error.
            Value::String(_) => Ok(Value::Null),
            other => Err(EvalError::Type(format!(
                "member must be a string or integer, got {}",
                other.type_name()
            ))),
        },
        other => Err(EvalError::Type(format!(
            "cannot access a member of {}",
            other.type_name()
        ))),
    }
}

/// Normalize an iteration collection into (key, value) pairs: arrays keep
/// index order, objects keep insertion order, Null is empty, any other
/// scalar is a single-element sequence.
fn normalize_collection(coll: &Value) -> Vec<(Value, Value)> {
    match coll {
        Value::Array(arr) => arr
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::Number(i as f64), v.clone()))
            .collect(),
        Value::Object(map) => map
            .borrow()
            .iter()
            .map(|(k, v)| (Value::string(k.clone()), v.clone()))
            .collect(),
        Value::Null => Vec::new(),
        scalar => vec![(Value::Number(0.0), scalar.clone())],
    }
}

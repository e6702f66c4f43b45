// lexel - embeddable expression language
// Copyright (c) 2026 lexel contributors
// Licensed under the MIT License

//! # lexel
//!
//! An embeddable expression language for rules engines and similar hosts.
//! Compile a user-authored formula once, then evaluate it repeatedly against
//! host-supplied variables and functions.
//!
//! ## Architecture
//!
//! - `lexer` - tokenizer (numeric literal forms, string escapes, comments)
//! - `parser` - precedence-climbing parser producing the atom tree
//! - `ast` - atom vocabulary and [`CompiledExpression`]
//! - `scope` - chain of nested variable/function scopes ([`Context`])
//! - `evaluator` - recursive tree walker
//! - `functions` - native function [`Registry`] with the builtin catalog
//! - `value` - the dynamically-typed runtime [`Value`]
//!
//! ## Example
//!
//! ```
//! use lexel::{compile, run, Context, Registry, Value};
//!
//! let ce = compile("each item in items: item.price * (1 + rate)").unwrap();
//! let registry = Registry::new();
//!
//! let ctx = Context::new();
//! ctx.define_var("rate", Value::from(0.5));
//! ctx.define_var(
//!     "items",
//!     Value::from(serde_json::json!([{ "price": 100 }, { "price": 50 }])),
//! );
//!
//! let result = run(&ce, &ctx, &registry).unwrap();
//! assert_eq!(result.get_index(0), Some(Value::from(150.0)));
//! ```
//!
//! A compiled expression is immutable and reusable; each evaluation call
//! supplies its own [`Context`] chain. The root context persists across
//! calls and accumulates globals defined during execution.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod value;

pub use ast::CompiledExpression;
pub use error::{Error, EvalError, ParseError};
pub use evaluator::Evaluator;
pub use functions::Registry;
pub use parser::compile;
pub use scope::Context;
pub use value::Value;

/// Evaluate a compiled expression against a context chain, resolving native
/// calls through `registry`.
pub fn run(ce: &CompiledExpression, ctx: &Context, registry: &Registry) -> Result<Value, EvalError> {
    Evaluator::new(registry).run(ce, ctx)
}

/// Compile and evaluate in one step.
pub fn evaluate(source: &str, ctx: &Context, registry: &Registry) -> Result<Value, Error> {
    let ce = compile(source)?;
    Ok(run(&ce, ctx, registry)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_fused() {
        let registry = Registry::new();
        let ctx = Context::new();
        assert_eq!(
            evaluate("2 + 3 * 4", &ctx, &registry).unwrap(),
            Value::from(14.0)
        );
    }

    #[test]
    fn test_compile_once_evaluate_many() {
        let registry = Registry::new();
        let ce = compile("price * quantity").unwrap();

        let ctx = Context::with_vars([
            ("price".to_string(), Value::from(100.0)),
            ("quantity".to_string(), Value::from(5.0)),
        ]);
        assert_eq!(run(&ce, &ctx, &registry).unwrap(), Value::from(500.0));

        let ctx = Context::with_vars([
            ("price".to_string(), Value::from(3.0)),
            ("quantity".to_string(), Value::from(7.0)),
        ]);
        assert_eq!(run(&ce, &ctx, &registry).unwrap(), Value::from(21.0));
    }

    #[test]
    fn test_compile_error_surfaces() {
        assert!(matches!(
            evaluate("(1 +", &Context::new(), &Registry::new()),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_eval_error_surfaces() {
        assert!(matches!(
            evaluate("nosuchfn()", &Context::new(), &Registry::new()),
            Err(Error::Eval(EvalError::Reference(_)))
        ));
    }

    #[test]
    fn test_globals_persist_across_calls() {
        let registry = Registry::new();
        let ctx = Context::new();
        evaluate("area = 3.14159265 * 4 * 4", &ctx, &registry).unwrap();
        let half = evaluate("area / 2", &ctx, &registry).unwrap();
        assert!((half.as_f64().unwrap() - 25.1327412).abs() < 1e-6);
    }
}

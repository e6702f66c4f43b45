// Atom tree definitions: the closed set of node kinds the parser produces
// and the evaluator walks. Trees are immutable once built and safe to share
// across repeated evaluations.

use std::rc::Rc;

use crate::value::Value;

/// Unary operators. Unary `+` is folded away at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Numeric negation `-`
    Neg,
    /// Logical not `!` / `not`
    Not,
    /// Bitwise complement `~`
    BitNot,
}

/// Binary operators that survive to runtime. Ternary `? :` desugars to an
/// `If` atom and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Ushr,
    In,
    Range,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    StrictEq,
    Ne,
    StrictNe,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
    Coalesce,
    NumCoalesce,
}

/// Scope qualifier on an assignment: `local x = ..` writes the current scope,
/// `global x = ..` writes the root, unqualified walks the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    None,
    Local,
    Global,
}

/// A node in the atom tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Scalar literal as decoded by the lexer.
    Literal(Value),

    /// `[ a, b, c ]` — constructs a fresh array identity per evaluation.
    ArrayLit(Vec<Node>),

    /// `{ key: v, [expr]: v }` — keys are Literal strings or computed nodes.
    ObjectLit(Vec<(Node, Node)>),

    /// Bare identifier read.
    VarRef(String),

    /// Member/index access `a.b`, `a[i]`; `null_safe` variants `?.` `?[`
    /// short-circuit to Null when the scope expression is Null.
    Deref {
        scope: Box<Node>,
        member: Box<Node>,
        null_safe: bool,
    },

    Unary {
        op: UnOp,
        operand: Box<Node>,
    },

    Binary {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },

    /// Separator-joined expression sequence; evaluates to its last item.
    List(Vec<Node>),

    /// `do .. done` — a List evaluated in a fresh child scope.
    Block(Vec<Node>),

    If {
        test: Box<Node>,
        then: Box<Node>,
        elifs: Vec<(Node, Node)>,
        otherwise: Option<Box<Node>>,
    },

    Case {
        whens: Vec<(Node, Node)>,
        otherwise: Option<Box<Node>>,
    },

    /// `each VALUE (, KEY)? in COLLECTION : BODY`
    Iterate {
        value_name: String,
        key_name: Option<String>,
        collection: Box<Node>,
        body: Box<Node>,
    },

    /// `first VALUE (, KEY)? in COLLECTION with PREDICATE (: RESULT)?`
    Search {
        value_name: String,
        key_name: Option<String>,
        collection: Box<Node>,
        predicate: Box<Node>,
        result: Option<Box<Node>>,
    },

    /// Named call; the callee resolves through the scope chain, then the
    /// registry, at evaluation time.
    Call {
        name: String,
        args: Vec<Node>,
    },

    /// `define NAME(params) BODY` — installs a closure over the defining
    /// scope chain. The body is Rc-shared with the closures it produces.
    FuncDef {
        name: String,
        params: Vec<String>,
        body: Rc<Node>,
    },

    /// `target = value` with an optional scope qualifier. The target is a
    /// VarRef or a Deref; anything else is rejected at parse time.
    Assign {
        target: Box<Node>,
        value: Box<Node>,
        qualifier: Qualifier,
    },
}

impl Node {
    pub fn literal(v: impl Into<Value>) -> Self {
        Node::Literal(v.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        Node::VarRef(name.into())
    }
}

/// A compiled expression: the root List atom plus the source text it came
/// from (kept for diagnostics). Immutable and reusable; evaluating it twice
/// against fresh contexts leaves no shared state behind.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    root: Node,
    source: String,
}

impl CompiledExpression {
    pub(crate) fn new(root: Node, source: impl Into<String>) -> Self {
        CompiledExpression {
            root,
            source: source.into(),
        }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

// Runtime value model: Rc-wrapped containers with shared-mutation semantics.
// Arrays and objects are reference types; cloning a Value clones the handle,
// and writes through one handle are visible to every holder.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::ast::Node;
use crate::error::EvalError;
use crate::scope::Context;

/// A dynamically-typed runtime value.
///
/// Containers (Array, Object) are `Rc<RefCell<..>>` so that member assignment
/// writes through the shared reference. Two containers produced by evaluating
/// the same literal at different times are distinct identities; the language's
/// `==` compares containers by identity, not contents.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Function),
}

/// A callable value: either a user-defined closure or a host-native function.
#[derive(Clone)]
pub enum Function {
    Closure(Rc<Closure>),
    Native(Rc<Native>),
}

/// A user-defined function bound to its defining scope chain.
pub struct Closure {
    pub name: Rc<str>,
    pub params: Vec<String>,
    pub body: Rc<Node>,
    /// The scope chain in effect at the `define`; invocation pushes a child
    /// of this chain, not of the caller's.
    pub scope: Context,
}

/// Signature every native function implements. The active scope chain is
/// passed so natives may read or write host state bound into it.
pub type NativeFn = dyn Fn(&Context, &[Value]) -> Result<Value, EvalError>;

/// A host-supplied native function with its minimum required argument count.
pub struct Native {
    pub name: String,
    pub min_args: usize,
    pub run: Box<NativeFn>,
}

impl Native {
    pub fn new(
        name: impl Into<String>,
        min_args: usize,
        run: impl Fn(&Context, &[Value]) -> Result<Value, EvalError> + 'static,
    ) -> Self {
        Native {
            name: name.into(),
            min_args,
            run: Box::new(run),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Closure(c) => write!(f, "<function {}>", c.name),
            Function::Native(n) => write!(f, "<native {}>", n.name),
        }
    }
}

// ── Type checks ──────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Name of the runtime type, as reported by the `typeof` builtin.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&Rc<RefCell<Vec<Value>>>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Rc<RefCell<IndexMap<String, Value>>>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Look up an object member by key. Convenience for hosts and tests.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(m) => m.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Look up an array element by position. Convenience for hosts and tests.
    pub fn get_index(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(a) => a.borrow().get(index).cloned(),
            _ => None,
        }
    }
}

// ── Coercions ────────────────────────────────────────────────────────────────
//
// Only the documented coercions exist, each as a named function; operators
// pattern-match on tags and reject everything else.

impl Value {
    /// Truthiness: Null, false, 0, NaN and the empty string are falsy;
    /// everything else (including empty containers) is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Numeric reading used by `?#` and the array side of `in`: numbers pass
    /// through, numeric strings parse, everything else is not a number.
    pub fn num(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Arithmetic operand coercion: Null counts as 0, numbers pass through,
    /// all other tags are rejected (the caller raises a type error).
    pub fn arith(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Null => Some(0.0),
            _ => None,
        }
    }

    /// String-position coercion for concatenation: Null becomes the empty
    /// string; scalars render without quotes; containers render as their
    /// display form.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }

    /// Identity comparison for containers and functions; used by the
    /// language's `==`/`===` on reference types.
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(Function::Closure(a)), Value::Function(Function::Closure(b))) => {
                Rc::ptr_eq(a, b)
            }
            (Value::Function(Function::Native(a)), Value::Function(Function::Native(b))) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }

    /// Recursive copy with fresh identities (the `clone` builtin).
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(a) => {
                let copied: Vec<Value> = a.borrow().iter().map(Value::deep_clone).collect();
                Value::array(copied)
            }
            Value::Object(m) => {
                let copied: IndexMap<String, Value> = m
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect();
                Value::object(copied)
            }
            other => other.clone(),
        }
    }
}

/// 32-bit integer conversion used by the bitwise operators: truncate toward
/// zero, wrap modulo 2^32, non-finite maps to 0.
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let t = n.trunc();
    let m = t.rem_euclid(4_294_967_296.0);
    if m >= 2_147_483_648.0 {
        (m - 4_294_967_296.0) as i32
    } else {
        m as i32
    }
}

/// Number rendering: whole finite values print without a decimal point
/// (f64 Display already omits the trailing `.0`), non-finite values use
/// their conventional names.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "Infinity" } else { "-Infinity" };
        s.to_string()
    } else {
        format!("{}", n)
    }
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::String(s.into())
    }

    #[inline]
    pub fn array(v: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(v)))
    }

    #[inline]
    pub fn object(m: IndexMap<String, Value>) -> Self {
        Value::Object(Rc::new(RefCell::new(m)))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::array(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::object(m)
    }
}

// ── PartialEq ────────────────────────────────────────────────────────────────
//
// Structural equality for hosts and tests. The *language* compares containers
// by identity; that lives in the evaluator, not here.

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    return false;
                }
                a == b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => match (a, b) {
                (Function::Closure(x), Function::Closure(y)) => Rc::ptr_eq(x, y),
                (Function::Native(x), Function::Native(y)) => Rc::ptr_eq(x, y),
                _ => false,
            },
            _ => false,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\":{}", escape_string(k), v)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "{:?}", func),
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

// ── Serialization ────────────────────────────────────────────────────────────

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serializer.serialize_none()
                } else if n.fract() == 0.0 && *n >= i64::MIN as f64 && *n <= i64::MAX as f64 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(arr) => {
                let arr = arr.borrow();
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Object(map) => {
                let map = map.borrow();
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Function(_) => serializer.serialize_none(),
        }
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any valid JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v.into()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(elem) = seq.next_element()? {
            vec.push(elem);
        }
        Ok(Value::array(vec))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut m = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry()? {
            m.insert(k, v);
        }
        Ok(Value::object(m))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(arr) => {
                Value::array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let m: IndexMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
                Value::object(m)
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serde_json::Value::Null
                } else {
                    serde_json::json!(*n)
                }
            }
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.borrow().iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => {
                let m: serde_json::Map<String, serde_json::Value> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect();
                serde_json::Value::Object(m)
            }
        }
    }
}

// ── value! macro ─────────────────────────────────────────────────────────────

/// Macro for constructing Value literals, similar to serde_json::json!
///
/// Usage:
///   value!(null)           → Value::Null
///   value!(true)           → Value::Bool(true)
///   value!(42)             → Value::Number(42.0)
///   value!("hello")        → Value::String(Rc::from("hello"))
///   value!([1, 2, 3])      → fresh Array
///   value!({"k": v, ...})  → fresh Object
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::value::Value::Null
    };

    (true) => {
        $crate::value::Value::Bool(true)
    };

    (false) => {
        $crate::value::Value::Bool(false)
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::value::Value::array(vec![ $( $crate::value!($elem) ),* ])
    };

    ({ $($key:tt : $val:tt),* $(,)? }) => {
        {
            let mut map = indexmap::IndexMap::new();
            $(
                map.insert(($key).to_string(), $crate::value!($val));
            )*
            $crate::value::Value::object(map)
        }
    };

    ($other:expr) => {
        $crate::value::Value::from($other)
    };
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_identity() {
        let arr = Value::array(vec![Value::from(1i64), Value::from(2i64)]);
        let arr2 = arr.clone();
        assert!(arr.same_ref(&arr2));

        // A write through one handle is visible through the other.
        if let Value::Array(a) = &arr {
            a.borrow_mut().push(Value::from(3i64));
        }
        assert_eq!(arr2.get_index(2), Some(Value::from(3i64)));
    }

    #[test]
    fn test_separate_literals_are_distinct() {
        let a = Value::array(vec![Value::from(1i64)]);
        let b = Value::array(vec![Value::from(1i64)]);
        assert!(!a.same_ref(&b));
        // but structurally equal for host-side comparison
        assert_eq!(a, b);
    }

    #[test]
    fn test_deep_clone_detaches() {
        let a = Value::array(vec![Value::from(1i64)]);
        let b = a.deep_clone();
        assert!(!a.same_ref(&b));
        if let Value::Array(inner) = &a {
            inner.borrow_mut().push(Value::from(2i64));
        }
        assert_eq!(b.get_index(1), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::string("").truthy());
        assert!(Value::string("x").truthy());
        // empty containers are truthy
        assert!(Value::array(vec![]).truthy());
        assert!(Value::object(IndexMap::new()).truthy());
    }

    #[test]
    fn test_int32_conversion() {
        assert_eq!(to_int32(-16.0), -16);
        assert_eq!(to_int32(4_294_967_296.0), 0);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(f64::NAN), 0);
        assert_eq!(to_int32(f64::INFINITY), 0);
        assert_eq!(to_int32(3.7), 3);
        assert_eq!(to_int32(-3.7), -3);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(2.75), "2.75");
        assert_eq!(format_number(-5.0), "-5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_value_macro() {
        let n = value!(null);
        assert!(n.is_null());

        let arr = value!([1i64, 2i64, 3i64]);
        assert_eq!(arr.get_index(2), Some(Value::from(3i64)));

        let obj = value!({"name": "Alice", "age": 30i64});
        assert_eq!(obj.get("name"), Some(Value::from("Alice")));
    }

    #[test]
    fn test_from_serde_json() {
        let sv = serde_json::json!({"name": "Alice", "scores": [1, 2, 3]});
        let v = Value::from(sv);
        assert_eq!(v.get("name"), Some(Value::from("Alice")));
        assert_eq!(
            v.get("scores").and_then(|s| s.get_index(1)),
            Some(Value::from(2i64))
        );
    }

    #[test]
    fn test_serde_roundtrip() {
        let v = value!({"name": "Alice", "scores": [1i64, 2i64], "active": true});
        let json = serde_json::to_string(&v).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::from(3.0).to_text(), "3");
        assert_eq!(Value::from("abc").to_text(), "abc");
        assert_eq!(Value::Bool(true).to_text(), "true");
    }
}

// Native function registry and the default builtin catalog.
//
// The registry maps a name to its minimum argument count and callable; the
// evaluator consults it after the scope chain, and passes the active context
// as the callable's first argument. `sort` is not here: it needs deferred
// comparator evaluation and lives in the evaluator as a special form.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{Datelike, Local, TimeZone, Timelike};
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

use crate::error::EvalError;
use crate::evaluator::strict_eq;
use crate::scope::Context;
use crate::value::{Native, Value};

/// Name → native function table, passed explicitly into the evaluator so
/// independent interpreter instances can carry different catalogs.
pub struct Registry {
    funcs: HashMap<String, Rc<Native>>,
}

impl Registry {
    /// A registry preloaded with the default builtin catalog.
    pub fn new() -> Self {
        let mut registry = Registry::empty();
        install_math(&mut registry);
        install_string(&mut registry);
        install_pattern(&mut registry);
        install_collections(&mut registry);
        install_encoding(&mut registry);
        install_datetime(&mut registry);
        registry
    }

    /// A registry with no functions at all.
    pub fn empty() -> Self {
        Registry {
            funcs: HashMap::new(),
        }
    }

    /// Register (or replace) a native function.
    pub fn register(
        &mut self,
        name: &str,
        min_args: usize,
        run: impl Fn(&Context, &[Value]) -> Result<Value, EvalError> + 'static,
    ) {
        self.funcs
            .insert(name.to_string(), Rc::new(Native::new(name, min_args, run)));
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<Native>> {
        self.funcs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Argument helpers ─────────────────────────────────────────────────────────

/// Numeric argument reading: numbers pass, numeric strings parse, anything
/// else is NaN (builtins follow the language's lenient numeric conversions).
fn fnum(v: &Value) -> f64 {
    v.num().unwrap_or(f64::NAN)
}

fn array_arg<'a>(
    args: &'a [Value],
    index: usize,
    name: &str,
) -> Result<&'a Rc<RefCell<Vec<Value>>>, EvalError> {
    args[index].as_array().ok_or_else(|| {
        EvalError::Type(format!(
            "{} requires an array, got {}",
            name,
            args[index].type_name()
        ))
    })
}

// ── Math ─────────────────────────────────────────────────────────────────────

/// Flatten nested arrays into scalars, for min/max aggregation.
fn flatten_into(values: &[Value], out: &mut Vec<Value>) {
    for v in values {
        match v {
            Value::Array(inner) => flatten_into(&inner.borrow(), out),
            other => out.push(other.clone()),
        }
    }
}

fn fold_numeric(args: &[Value], pick: impl Fn(f64, f64) -> f64) -> Value {
    let mut flat = Vec::new();
    flatten_into(args, &mut flat);
    let mut acc: Option<f64> = None;
    for v in &flat {
        if let Some(n) = v.num() {
            acc = Some(match acc {
                Some(a) => pick(a, n),
                None => n,
            });
        }
    }
    acc.map_or(Value::Null, Value::Number)
}

fn install_math(registry: &mut Registry) {
    registry.register("abs", 1, |_, args| Ok(Value::Number(fnum(&args[0]).abs())));
    registry.register("sign", 1, |_, args| {
        let n = fnum(&args[0]);
        let s = if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            n
        };
        Ok(Value::Number(s))
    });
    registry.register("floor", 1, |_, args| {
        Ok(Value::Number(fnum(&args[0]).floor()))
    });
    registry.register("ceil", 1, |_, args| Ok(Value::Number(fnum(&args[0]).ceil())));
    registry.register("trunc", 1, |_, args| {
        Ok(Value::Number(fnum(&args[0]).trunc()))
    });
    // round(n, places): half-away-from-zero behavior matching the
    // floor(n * 10^p + 0.5) formulation.
    registry.register("round", 1, |_, args| {
        let n = fnum(&args[0]);
        let places = args.get(1).map_or(0.0, fnum);
        let factor = 10f64.powf(places.trunc());
        Ok(Value::Number((n * factor + 0.5).floor() / factor))
    });
    registry.register("cos", 1, |_, args| Ok(Value::Number(fnum(&args[0]).cos())));
    registry.register("sin", 1, |_, args| Ok(Value::Number(fnum(&args[0]).sin())));
    registry.register("tan", 1, |_, args| Ok(Value::Number(fnum(&args[0]).tan())));
    registry.register("log", 1, |_, args| Ok(Value::Number(fnum(&args[0]).ln())));
    registry.register("exp", 1, |_, args| Ok(Value::Number(fnum(&args[0]).exp())));
    registry.register("sqrt", 1, |_, args| Ok(Value::Number(fnum(&args[0]).sqrt())));
    registry.register("pow", 2, |_, args| {
        Ok(Value::Number(fnum(&args[0]).powf(fnum(&args[1]))))
    });
    // min/max flatten nested array arguments and ignore non-numeric values.
    registry.register("min", 1, |_, args| Ok(fold_numeric(args, f64::min)));
    registry.register("max", 1, |_, args| Ok(fold_numeric(args, f64::max)));
}

// ── Strings and conversions ──────────────────────────────────────────────────

fn install_string(registry: &mut Registry) {
    registry.register("len", 1, |_, args| {
        Ok(Value::Number(args[0].to_text().chars().count() as f64))
    });
    registry.register("substr", 2, |_, args| {
        let s: Vec<char> = args[0].to_text().chars().collect();
        let start = fnum(&args[1]).max(0.0) as usize;
        let len = match args.get(2) {
            Some(v) if !v.is_null() => fnum(v).max(0.0) as usize,
            _ => s.len(),
        };
        let start = start.min(s.len());
        let end = start.saturating_add(len).min(s.len());
        Ok(Value::string(s[start..end].iter().collect::<String>()))
    });
    registry.register("upper", 1, |_, args| {
        Ok(Value::string(args[0].to_text().to_uppercase()))
    });
    registry.register("lower", 1, |_, args| {
        Ok(Value::string(args[0].to_text().to_lowercase()))
    });
    registry.register("ltrim", 1, |_, args| {
        Ok(Value::string(args[0].to_text().trim_start().to_string()))
    });
    registry.register("rtrim", 1, |_, args| {
        Ok(Value::string(args[0].to_text().trim_end().to_string()))
    });
    registry.register("trim", 1, |_, args| {
        Ok(Value::string(args[0].to_text().trim().to_string()))
    });
    // str(null) renders "null", unlike the concatenation coercion.
    registry.register("str", 1, |_, args| {
        let s = match &args[0] {
            Value::Null => "null".to_string(),
            other => other.to_text(),
        };
        Ok(Value::string(s))
    });
    // int() understands the same 0x/0o/0b prefixes the lexer does and
    // yields NaN (not an error) for unparseable input.
    registry.register("int", 1, |_, args| {
        let n = match &args[0] {
            Value::Number(n) => n.trunc(),
            Value::String(s) => parse_int_text(s.trim()),
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        };
        Ok(Value::Number(n))
    });
    registry.register("float", 1, |_, args| Ok(Value::Number(fnum(&args[0]))));
    // bool() applies truthiness plus the conventional word forms.
    registry.register("bool", 1, |_, args| {
        let b = match &args[0] {
            Value::String(s) => !matches!(
                s.trim().to_lowercase().as_str(),
                "" | "0" | "no" | "off" | "false"
            ),
            other => other.truthy(),
        };
        Ok(Value::Bool(b))
    });
    registry.register("isNaN", 1, |_, args| {
        let nan = match &args[0] {
            Value::Number(n) => n.is_nan(),
            Value::String(s) => s.trim().parse::<f64>().map_or(true, f64::is_nan),
            Value::Null | Value::Bool(_) => false,
            _ => true,
        };
        Ok(Value::Bool(nan))
    });
    registry.register("isInfinity", 1, |_, args| {
        Ok(Value::Bool(args[0].as_f64().is_some_and(f64::is_infinite)))
    });
    registry.register("isnull", 1, |_, args| Ok(Value::Bool(args[0].is_null())));
    registry.register("typeof", 1, |_, args| {
        Ok(Value::string(args[0].type_name()))
    });
    registry.register("hex", 1, |_, args| {
        let n = fnum(&args[0]).trunc() as i64;
        let s = if n < 0 {
            format!("-{:x}", n.unsigned_abs())
        } else {
            format!("{:x}", n)
        };
        Ok(Value::string(s))
    });
}

fn parse_int_text(text: &str) -> f64 {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let parsed = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok().map(|n| n as f64)
    } else if let Some(oct) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok().map(|n| n as f64)
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok().map(|n| n as f64)
    } else {
        body.parse::<f64>().ok().map(f64::trunc)
    };
    match parsed {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }
}

// ── Regex functions ──────────────────────────────────────────────────────────

fn build_regex(pattern: &str, flags: &str) -> Result<Regex, EvalError> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .build()
        .map_err(|e| EvalError::Type(format!("invalid pattern: {}", e)))
}

fn install_pattern(registry: &mut Registry) {
    // match(s, pattern, group?, flags?) -> matched group text or null
    registry.register("match", 2, |_, args| {
        let text = args[0].to_text();
        let pattern = args[1].to_text();
        let group = args.get(2).map_or(0.0, fnum).max(0.0) as usize;
        let flags = args.get(3).map(Value::to_text).unwrap_or_default();
        let re = build_regex(&pattern, &flags)?;
        let result = re
            .captures(&text)
            .and_then(|caps| caps.get(group))
            .map(|m| Value::string(m.as_str()))
            .unwrap_or(Value::Null);
        Ok(result)
    });

    // find(s, pattern, flags?) -> character position of the match or null
    registry.register("find", 2, |_, args| {
        let text = args[0].to_text();
        let pattern = args[1].to_text();
        let flags = args.get(2).map(Value::to_text).unwrap_or_default();
        let re = build_regex(&pattern, &flags)?;
        let result = re
            .find(&text)
            .map(|m| Value::Number(text[..m.start()].chars().count() as f64))
            .unwrap_or(Value::Null);
        Ok(result)
    });

    // replace(s, pattern, replacement, flags?) — 'g' replaces all matches
    registry.register("replace", 3, |_, args| {
        let text = args[0].to_text();
        let pattern = args[1].to_text();
        let replacement = args[2].to_text();
        let flags = args.get(3).map(Value::to_text).unwrap_or_default();
        let re = build_regex(&pattern, &flags)?;
        let replaced = if flags.contains('g') {
            re.replace_all(&text, replacement.as_str())
        } else {
            re.replace(&text, replacement.as_str())
        };
        Ok(Value::string(replaced.into_owned()))
    });
}

// ── Arrays and objects ───────────────────────────────────────────────────────

fn contains_strict(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|v| strict_eq(v, needle))
}

/// Shared by `concat` and `arrayConcat`: a fresh array with array arguments
/// spliced in and scalars appended as single elements.
fn concat(_: &Context, args: &[Value]) -> Result<Value, EvalError> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::array(out))
}

fn install_collections(registry: &mut Registry) {
    // count of non-null elements
    registry.register("count", 1, |_, args| {
        let n = match args[0].as_array() {
            Some(arr) => arr.borrow().iter().filter(|v| !v.is_null()).count(),
            None => 0,
        };
        Ok(Value::Number(n as f64))
    });
    // sum accepts arrays only; anything else totals 0
    registry.register("sum", 1, |_, args| {
        let total = match args[0].as_array() {
            Some(arr) => arr
                .borrow()
                .iter()
                .map(|v| v.num().unwrap_or(0.0))
                .sum::<f64>(),
            None => 0.0,
        };
        Ok(Value::Number(total))
    });
    registry.register("median", 1, |_, args| {
        let arr = array_arg(args, 0, "median")?;
        let mut ns: Vec<f64> = arr.borrow().iter().filter_map(Value::num).collect();
        if ns.is_empty() {
            return Ok(Value::Null);
        }
        ns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = ns.len() / 2;
        let median = if ns.len() % 2 == 1 {
            ns[mid]
        } else {
            (ns[mid - 1] + ns[mid]) / 2.0
        };
        Ok(Value::Number(median))
    });
    registry.register("keys", 1, |_, args| {
        let keys = match args[0].as_object() {
            Some(map) => map.borrow().keys().map(|k| Value::string(k.as_str())).collect(),
            None => Vec::new(),
        };
        Ok(Value::array(keys))
    });
    registry.register("values", 1, |_, args| {
        let values = match args[0].as_object() {
            Some(map) => map.borrow().values().cloned().collect(),
            None => Vec::new(),
        };
        Ok(Value::array(values))
    });
    // strict-equality position search, -1 when absent
    registry.register("indexOf", 2, |_, args| {
        let arr = array_arg(args, 0, "indexOf")?;
        let found = arr
            .borrow()
            .iter()
            .position(|v| strict_eq(v, &args[1]))
            .map_or(-1.0, |i| i as f64);
        Ok(Value::Number(found))
    });
    registry.register("clone", 1, |_, args| Ok(args[0].deep_clone()));

    registry.register("concat", 2, concat);
    registry.register("arrayConcat", 2, concat);

    registry.register("slice", 2, |_, args| {
        let arr = array_arg(args, 0, "slice")?;
        let arr = arr.borrow();
        let start = (fnum(&args[1]).max(0.0) as usize).min(arr.len());
        let end = match args.get(2) {
            Some(v) if !v.is_null() => (fnum(v).max(0.0) as usize).min(arr.len()),
            _ => arr.len(),
        };
        let out: Vec<Value> = if start < end {
            arr[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(Value::array(out))
    });

    // The mutators below operate on the shared array in place; every holder
    // of the reference sees the change.
    registry.register("insert", 3, |_, args| {
        let arr = array_arg(args, 0, "insert")?;
        let mut arr_mut = arr.borrow_mut();
        let pos = (fnum(&args[1]).max(0.0) as usize).min(arr_mut.len());
        arr_mut.insert(pos, args[2].clone());
        drop(arr_mut);
        Ok(args[0].clone())
    });
    registry.register("remove", 2, |_, args| {
        let arr = array_arg(args, 0, "remove")?;
        let mut arr_mut = arr.borrow_mut();
        let start = (fnum(&args[1]).max(0.0) as usize).min(arr_mut.len());
        let end = match args.get(2) {
            Some(v) if !v.is_null() => (fnum(v).max(0.0) as usize).min(arr_mut.len().saturating_sub(1)),
            _ => start,
        };
        if start < arr_mut.len() && start <= end {
            arr_mut.drain(start..=end);
        }
        drop(arr_mut);
        Ok(args[0].clone())
    });
    // push(arr, value, limit?) keeps the last `limit` elements
    registry.register("push", 2, |_, args| {
        let arr = array_arg(args, 0, "push")?;
        let mut arr_mut = arr.borrow_mut();
        arr_mut.push(args[1].clone());
        if let Some(limit) = args.get(2).filter(|v| !v.is_null()) {
            let limit = fnum(limit).max(0.0) as usize;
            if arr_mut.len() > limit {
                let excess = arr_mut.len() - limit;
                arr_mut.drain(0..excess);
            }
        }
        drop(arr_mut);
        Ok(args[0].clone())
    });
    // unshift(arr, value, limit?) keeps the first `limit` elements
    registry.register("unshift", 2, |_, args| {
        let arr = array_arg(args, 0, "unshift")?;
        let mut arr_mut = arr.borrow_mut();
        arr_mut.insert(0, args[1].clone());
        if let Some(limit) = args.get(2).filter(|v| !v.is_null()) {
            let limit = fnum(limit).max(0.0) as usize;
            arr_mut.truncate(limit);
        }
        drop(arr_mut);
        Ok(args[0].clone())
    });
    registry.register("pop", 1, |_, args| {
        let arr = array_arg(args, 0, "pop")?;
        let popped = arr.borrow_mut().pop();
        Ok(popped.unwrap_or(Value::Null))
    });
    registry.register("shift", 1, |_, args| {
        let arr = array_arg(args, 0, "shift")?;
        let mut arr_mut = arr.borrow_mut();
        if arr_mut.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(arr_mut.remove(0))
        }
    });

    registry.register("arrayIntersection", 2, |_, args| {
        let a = array_arg(args, 0, "arrayIntersection")?.borrow();
        let b = array_arg(args, 1, "arrayIntersection")?.borrow();
        let out: Vec<Value> = a
            .iter()
            .filter(|v| contains_strict(&b, v))
            .cloned()
            .collect();
        Ok(Value::array(out))
    });
    registry.register("arrayDifference", 2, |_, args| {
        let a = array_arg(args, 0, "arrayDifference")?.borrow();
        let b = array_arg(args, 1, "arrayDifference")?.borrow();
        let out: Vec<Value> = a
            .iter()
            .filter(|v| !contains_strict(&b, v))
            .cloned()
            .collect();
        Ok(Value::array(out))
    });
    registry.register("arrayExclusive", 2, |_, args| {
        let a = array_arg(args, 0, "arrayExclusive")?.borrow();
        let b = array_arg(args, 1, "arrayExclusive")?.borrow();
        let mut out: Vec<Value> = a
            .iter()
            .filter(|v| !contains_strict(&b, v))
            .cloned()
            .collect();
        out.extend(b.iter().filter(|v| !contains_strict(&a, v)).cloned());
        Ok(Value::array(out))
    });
    registry.register("arrayUnion", 2, |_, args| {
        let a = array_arg(args, 0, "arrayUnion")?.borrow();
        let b = array_arg(args, 1, "arrayUnion")?.borrow();
        let mut out: Vec<Value> = a.to_vec();
        for v in b.iter() {
            if !contains_strict(&out, v) {
                out.push(v.clone());
            }
        }
        Ok(Value::array(out))
    });
}

// ── Encoding helpers ─────────────────────────────────────────────────────────

const BASE64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        out.push(BASE64_ALPHABET[(n >> 18) as usize & 63] as char);
        out.push(BASE64_ALPHABET[(n >> 12) as usize & 63] as char);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[(n >> 6) as usize & 63] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[n as usize & 63] as char
        } else {
            '='
        });
    }
    out
}

fn base64_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for ch in text.bytes() {
        if ch == b'=' || ch == b'\n' || ch == b'\r' {
            continue;
        }
        let v = BASE64_ALPHABET.iter().position(|&a| a == ch)? as u32;
        acc = (acc << 6) | v;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    Some(out)
}

/// Unreserved characters that pass through URL encoding unchanged.
fn url_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

fn install_encoding(registry: &mut Registry) {
    registry.register("btoa", 1, |_, args| {
        Ok(Value::string(base64_encode(args[0].to_text().as_bytes())))
    });
    registry.register("atob", 1, |_, args| {
        let decoded = base64_decode(&args[0].to_text())
            .ok_or_else(|| EvalError::Type("invalid base64 input".into()))?;
        Ok(Value::string(String::from_utf8_lossy(&decoded).into_owned()))
    });
    registry.register("urlencode", 1, |_, args| {
        let text = args[0].to_text();
        let mut out = String::with_capacity(text.len());
        for b in text.bytes() {
            if url_unreserved(b) {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        Ok(Value::string(out))
    });
    registry.register("urldecode", 1, |_, args| {
        let text = args[0].to_text();
        let bytes = text.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| EvalError::Type("invalid percent escape".into()))?;
                out.push(hex);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        Ok(Value::string(String::from_utf8_lossy(&out).into_owned()))
    });
}

// ── Date/time ────────────────────────────────────────────────────────────────

fn install_datetime(registry: &mut Registry) {
    // time() -> now in epoch milliseconds;
    // time(y, m, d, h, min, s) -> local civil time, month base 1
    registry.register("time", 0, |_, args| {
        if args.is_empty() {
            return Ok(Value::Number(Local::now().timestamp_millis() as f64));
        }
        let year = fnum(&args[0]).trunc() as i32;
        let month = args.get(1).map_or(1.0, fnum).trunc() as u32;
        let day = args.get(2).map_or(1.0, fnum).trunc() as u32;
        let hour = args.get(3).map_or(0.0, fnum).trunc() as u32;
        let minute = args.get(4).map_or(0.0, fnum).trunc() as u32;
        let second = args.get(5).map_or(0.0, fnum).trunc() as u32;
        let dt = Local
            .with_ymd_and_hms(year, month, day, hour, minute, second)
            .single()
            .ok_or_else(|| EvalError::Range("invalid date components".into()))?;
        Ok(Value::Number(dt.timestamp_millis() as f64))
    });

    // dateparts(t?) -> { year, month, day, hour, minute, second, weekday }
    // in local time; weekday counts from Sunday = 0
    registry.register("dateparts", 0, |_, args| {
        let millis = match args.first() {
            Some(v) if !v.is_null() => fnum(v) as i64,
            _ => Local::now().timestamp_millis(),
        };
        let dt = Local
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| EvalError::Range("timestamp out of range".into()))?;
        let mut map = IndexMap::new();
        map.insert("year".to_string(), Value::Number(dt.year() as f64));
        map.insert("month".to_string(), Value::Number(dt.month() as f64));
        map.insert("day".to_string(), Value::Number(dt.day() as f64));
        map.insert("hour".to_string(), Value::Number(dt.hour() as f64));
        map.insert("minute".to_string(), Value::Number(dt.minute() as f64));
        map.insert("second".to_string(), Value::Number(dt.second() as f64));
        map.insert(
            "weekday".to_string(),
            Value::Number(dt.weekday().num_days_from_sunday() as f64),
        );
        Ok(Value::object(map))
    });
}

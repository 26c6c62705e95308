//! Operator semantics, builtin functions and methods of the script language.

use std::cmp::Ordering;

use super::ast::{BinaryOp, CompareOp};
use crate::error::{FragmentError, FragmentErrorKind};
use crate::state::Value;

/// Methods that modify their receiver in place.
/// Upper bound on the length of a string or list built from a count.
const MAX_SEQUENCE_LEN: usize = 1 << 26;

const MUTATING_METHODS: &[&str] = &["append", "pop", "extend", "update"];

pub fn is_mutating_method(name: &str) -> bool {
    MUTATING_METHODS.contains(&name)
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn overflow() -> FragmentError {
    FragmentError::new(FragmentErrorKind::Overflow, "integer overflow")
}

fn division_by_zero() -> FragmentError {
    FragmentError::new(FragmentErrorKind::DivisionByZero, "division by zero")
}

fn value_error(message: impl Into<String>) -> FragmentError {
    FragmentError::new(FragmentErrorKind::Value, message)
}

// -------------------------------------------------------------------------
// Operators
// -------------------------------------------------------------------------

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, FragmentError> {
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s))
            if as_int(n).is_some() =>
        {
            let times = repeat_count(s.len(), n)?;
            Ok(Value::Str(s.repeat(times)))
        }
        (BinaryOp::Mul, Value::List(items), n) | (BinaryOp::Mul, n, Value::List(items))
            if as_int(n).is_some() =>
        {
            let times = repeat_count(items.len(), n)?;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::List(out))
        }
        _ => numeric(op, left, right),
    }
}

/// Truncate toward zero, rejecting values outside the `i64` range.
fn float_to_int(f: f64) -> Result<i64, FragmentError> {
    let truncated = f.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range.
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(FragmentError::new(
            FragmentErrorKind::Overflow,
            "float too large to convert to int",
        ));
    }
    Ok(truncated as i64)
}

/// Validated repeat count for `seq * n`; the result may hold at most
/// [`MAX_SEQUENCE_LEN`] bytes or items.
fn repeat_count(len: usize, n: &Value) -> Result<usize, FragmentError> {
    let times = usize::try_from(as_int(n).unwrap_or(0).max(0)).unwrap_or(usize::MAX);
    match len.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(times),
        _ => Err(FragmentError::new(
            FragmentErrorKind::Overflow,
            "repeated sequence is too long",
        )),
    }
}

fn numeric(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, FragmentError> {
    if let (Some(a), Some(b)) = (as_int(left), as_int(right)) {
        return int_arith(op, a, b);
    }
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return float_arith(op, a, b);
    }
    Err(FragmentError::type_error(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    )))
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, FragmentError> {
    let value = match op {
        BinaryOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinaryOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinaryOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinaryOp::Div => {
            if b == 0 {
                return Err(division_by_zero());
            }
            Value::Float(a as f64 / b as f64)
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(division_by_zero());
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Value::Int(q - 1)
            } else {
                Value::Int(q)
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(division_by_zero());
            }
            let r = a.wrapping_rem(b);
            if r != 0 && ((r < 0) != (b < 0)) {
                Value::Int(r + b)
            } else {
                Value::Int(r)
            }
        }
        BinaryOp::Pow => {
            if b >= 0 {
                let exp = u32::try_from(b).map_err(|_| overflow())?;
                Value::Int(a.checked_pow(exp).ok_or_else(overflow)?)
            } else if a == 0 {
                return Err(division_by_zero());
            } else {
                Value::Float((a as f64).powf(b as f64))
            }
        }
    };
    Ok(value)
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<Value, FragmentError> {
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod if b == 0.0 => {
            return Err(division_by_zero());
        }
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Mod => {
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        BinaryOp::Pow => a.powf(b),
    };
    Ok(Value::Float(value))
}

pub fn negate(value: &Value) -> Result<Value, FragmentError> {
    match value {
        Value::Float(f) => Ok(Value::Float(-f)),
        other => match as_int(other) {
            Some(i) => Ok(Value::Int(i.checked_neg().ok_or_else(overflow)?)),
            None => Err(FragmentError::type_error(format!(
                "bad operand type for unary -: '{}'",
                other.type_name()
            ))),
        },
    }
}

pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, FragmentError> {
    let result = match op {
        CompareOp::Eq => left.loose_eq(right),
        CompareOp::Ne => !left.loose_eq(right),
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Lt => ordering(left, right)? == Ordering::Less,
        CompareOp::Le => ordering(left, right)? != Ordering::Greater,
        CompareOp::Gt => ordering(left, right)? == Ordering::Greater,
        CompareOp::Ge => ordering(left, right)? != Ordering::Less,
    };
    Ok(result)
}

fn ordering(left: &Value, right: &Value) -> Result<Ordering, FragmentError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = ordering(x, y)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .ok_or_else(|| value_error("cannot order NaN")),
            _ => Err(FragmentError::type_error(format!(
                "ordering not supported between '{}' and '{}'",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, FragmentError> {
    match (container, item) {
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Str(_), other) => Err(FragmentError::type_error(format!(
            "'in <str>' requires a str operand, not '{}'",
            other.type_name()
        ))),
        (Value::List(items), _) => Ok(items.iter().any(|v| v.loose_eq(item))),
        (Value::Dict(_), _) => Ok(container.dict_get(item).is_some()),
        _ => Err(FragmentError::type_error(format!(
            "'{}' value is not a container",
            container.type_name()
        ))),
    }
}

fn normalize_index(index: &Value, len: usize) -> Result<usize, FragmentError> {
    let i = as_int(index).ok_or_else(|| {
        FragmentError::type_error(format!("indices must be integers, not '{}'", index.type_name()))
    })?;
    let resolved = if i < 0 { i + len as i64 } else { i };
    if resolved < 0 || resolved >= len as i64 {
        return Err(FragmentError::new(FragmentErrorKind::Index, "index out of range"));
    }
    Ok(resolved as usize)
}

pub fn index(base: &Value, key: &Value) -> Result<Value, FragmentError> {
    match base {
        Value::List(items) => Ok(items[normalize_index(key, items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[normalize_index(key, chars.len())?].to_string()))
        }
        Value::Dict(_) => base.dict_get(key).cloned().ok_or_else(|| {
            FragmentError::new(FragmentErrorKind::Key, format!("key {} not found", key.repr()))
        }),
        other => Err(FragmentError::type_error(format!(
            "'{}' value is not subscriptable",
            other.type_name()
        ))),
    }
}

pub fn set_index(base: &mut Value, key: Value, value: Value) -> Result<(), FragmentError> {
    match base {
        Value::List(items) => {
            let i = normalize_index(&key, items.len())?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            match entries.iter_mut().find(|(k, _)| k.loose_eq(&key)) {
                Some((_, slot)) => *slot = value,
                None => entries.push((key, value)),
            }
            Ok(())
        }
        other => Err(FragmentError::type_error(format!(
            "'{}' value does not support item assignment",
            other.type_name()
        ))),
    }
}

pub fn iterate(value: &Value) -> Result<Vec<Value>, FragmentError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Dict(entries) => Ok(entries.iter().map(|(k, _)| k.clone()).collect()),
        other => Err(FragmentError::type_error(format!(
            "'{}' value is not iterable",
            other.type_name()
        ))),
    }
}

// -------------------------------------------------------------------------
// Functions
// -------------------------------------------------------------------------

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), FragmentError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(FragmentError::type_error(format!(
            "{name}() takes {expected} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

fn sort_values(items: &mut [Value]) -> Result<(), FragmentError> {
    let mut failure = None;
    items.sort_by(|a, b| {
        ordering(a, b).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        })
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn extremum(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value, FragmentError> {
    let candidates = if args.len() == 1 {
        iterate(&args[0])?
    } else {
        args
    };
    let mut iter = candidates.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| value_error(format!("{name}() arg is an empty sequence")))?;
    for candidate in iter {
        if ordering(&candidate, &best)? == want {
            best = candidate;
        }
    }
    Ok(best)
}

/// Call a builtin function by name.
pub fn call_function(name: &str, args: Vec<Value>) -> Result<Value, FragmentError> {
    match name {
        "len" => {
            check_arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Dict(entries) => entries.len(),
                other => {
                    return Err(FragmentError::type_error(format!(
                        "'{}' value has no len()",
                        other.type_name()
                    )));
                }
            };
            Ok(Value::Int(len as i64))
        }
        "str" => {
            check_arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(Value::to_string).unwrap_or_default()))
        }
        "int" => {
            check_arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Float(f)) if f.is_finite() => float_to_int(*f).map(Value::Int),
                Some(Value::Float(_)) => Err(value_error("cannot convert non-finite float to int")),
                Some(Value::Str(s)) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
                    value_error(format!("invalid literal for int(): {}", Value::from(s.as_str()).repr()))
                }),
                Some(other) => as_int(other).map(Value::Int).ok_or_else(|| {
                    FragmentError::type_error(format!("int() cannot convert '{}'", other.type_name()))
                }),
            }
        }
        "float" => {
            check_arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
                    value_error(format!(
                        "could not convert string to float: {}",
                        Value::from(s.as_str()).repr()
                    ))
                }),
                Some(other) => other.as_f64().map(Value::Float).ok_or_else(|| {
                    FragmentError::type_error(format!(
                        "float() cannot convert '{}'",
                        other.type_name()
                    ))
                }),
            }
        }
        "bool" => {
            check_arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }
        "abs" => {
            check_arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => match as_int(other) {
                    Some(i) => Ok(Value::Int(i.checked_abs().ok_or_else(overflow)?)),
                    None => Err(FragmentError::type_error(format!(
                        "bad operand type for abs(): '{}'",
                        other.type_name()
                    ))),
                },
            }
        }
        "min" => {
            check_arity(name, &args, 1, usize::MAX)?;
            extremum(name, args, Ordering::Less)
        }
        "max" => {
            check_arity(name, &args, 1, usize::MAX)?;
            extremum(name, args, Ordering::Greater)
        }
        "sum" => {
            check_arity(name, &args, 1, 2)?;
            let start = args.get(1).cloned().unwrap_or(Value::Int(0));
            iterate(&args[0])?
                .iter()
                .try_fold(start, |acc, item| binary(BinaryOp::Add, &acc, item))
        }
        "range" => {
            check_arity(name, &args, 1, 3)?;
            let ints = args
                .iter()
                .map(|a| {
                    as_int(a).ok_or_else(|| {
                        FragmentError::type_error(format!(
                            "range() arguments must be integers, not '{}'",
                            a.type_name()
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop, step) = match ints.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => unreachable!("arity checked above"),
            };
            if step == 0 {
                return Err(value_error("range() step must not be zero"));
            }
            let span = if step > 0 {
                (i128::from(stop) - i128::from(start)).max(0)
            } else {
                (i128::from(start) - i128::from(stop)).max(0)
            };
            let step_size = i128::from(step).abs();
            let count = (span + step_size - 1) / step_size;
            if count > MAX_SEQUENCE_LEN as i128 {
                return Err(FragmentError::new(
                    FragmentErrorKind::Overflow,
                    "range() is too long",
                ));
            }
            let mut out = Vec::with_capacity(count as usize);
            let mut i = start;
            while (step > 0 && i < stop) || (step < 0 && i > stop) {
                out.push(Value::Int(i));
                i = match i.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
            Ok(Value::List(out))
        }
        "sorted" => {
            check_arity(name, &args, 1, 1)?;
            let mut items = iterate(&args[0])?;
            sort_values(&mut items)?;
            Ok(Value::List(items))
        }
        "round" => {
            check_arity(name, &args, 1, 2)?;
            let x = args[0].as_f64().ok_or_else(|| {
                FragmentError::type_error(format!(
                    "round() needs a number, not '{}'",
                    args[0].type_name()
                ))
            })?;
            match args.get(1) {
                None if matches!(args[0], Value::Float(_)) => {
                    if !x.is_finite() {
                        return Err(value_error("cannot round a non-finite float to int"));
                    }
                    float_to_int(x.round()).map(Value::Int)
                }
                None => Ok(args[0].clone()),
                Some(digits) => {
                    let digits = as_int(digits).ok_or_else(|| {
                        FragmentError::type_error("round() digits must be an integer")
                    })?;
                    let factor = 10f64.powi(digits.clamp(-300, 300) as i32);
                    Ok(Value::Float((x * factor).round() / factor))
                }
            }
        }
        "list" => {
            check_arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::List(Vec::new())),
                Some(v) => Ok(Value::List(iterate(v)?)),
            }
        }
        "type" => {
            check_arity(name, &args, 1, 1)?;
            Ok(Value::Str(args[0].type_name().to_string()))
        }
        _ => Err(FragmentError::new(
            FragmentErrorKind::Name,
            format!("name '{name}' is not defined"),
        )),
    }
}

// -------------------------------------------------------------------------
// Methods
// -------------------------------------------------------------------------

fn no_method(receiver: &Value, name: &str) -> FragmentError {
    FragmentError::type_error(format!(
        "'{}' value has no method '{name}'",
        receiver.type_name()
    ))
}

fn str_arg<'a>(method: &str, args: &'a [Value], i: usize) -> Result<&'a str, FragmentError> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(FragmentError::type_error(format!(
            "{method}() argument must be str, not '{}'",
            other.type_name()
        ))),
        None => Err(FragmentError::type_error(format!("{method}() missing argument"))),
    }
}

/// Call a method that leaves its receiver untouched.
pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, FragmentError> {
    match receiver {
        Value::Str(s) => match name {
            "upper" => Ok(Value::Str(s.to_uppercase())),
            "lower" => Ok(Value::Str(s.to_lowercase())),
            "strip" => Ok(Value::Str(s.trim().to_string())),
            "lstrip" => Ok(Value::Str(s.trim_start().to_string())),
            "rstrip" => Ok(Value::Str(s.trim_end().to_string())),
            "split" => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::None) => s.split_whitespace().map(Value::from).collect(),
                    Some(_) => {
                        let sep = str_arg(name, args, 0)?;
                        if sep.is_empty() {
                            return Err(value_error("empty separator"));
                        }
                        s.split(sep).map(Value::from).collect()
                    }
                };
                Ok(Value::List(parts))
            }
            "replace" => {
                check_arity(name, args, 2, 2)?;
                Ok(Value::Str(s.replace(str_arg(name, args, 0)?, str_arg(name, args, 1)?)))
            }
            "startswith" => Ok(Value::Bool(s.starts_with(str_arg(name, args, 0)?))),
            "endswith" => Ok(Value::Bool(s.ends_with(str_arg(name, args, 0)?))),
            "join" => {
                check_arity(name, args, 1, 1)?;
                let parts = iterate(&args[0])?
                    .into_iter()
                    .map(|v| match v {
                        Value::Str(s) => Ok(s),
                        other => Err(FragmentError::type_error(format!(
                            "join() expects str items, found '{}'",
                            other.type_name()
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Str(parts.join(s)))
            }
            _ => Err(no_method(receiver, name)),
        },
        Value::List(items) => match name {
            "index" => {
                check_arity(name, args, 1, 1)?;
                items
                    .iter()
                    .position(|v| v.loose_eq(&args[0]))
                    .map(|i| Value::Int(i as i64))
                    .ok_or_else(|| value_error(format!("{} is not in list", args[0].repr())))
            }
            "count" => {
                check_arity(name, args, 1, 1)?;
                Ok(Value::Int(items.iter().filter(|v| v.loose_eq(&args[0])).count() as i64))
            }
            _ => Err(no_method(receiver, name)),
        },
        Value::Dict(entries) => match name {
            "keys" => Ok(Value::List(entries.iter().map(|(k, _)| k.clone()).collect())),
            "values" => Ok(Value::List(entries.iter().map(|(_, v)| v.clone()).collect())),
            "items" => Ok(Value::List(
                entries
                    .iter()
                    .map(|(k, v)| Value::List(vec![k.clone(), v.clone()]))
                    .collect(),
            )),
            "get" => {
                check_arity(name, args, 1, 2)?;
                Ok(receiver
                    .dict_get(&args[0])
                    .cloned()
                    .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
            }
            _ => Err(no_method(receiver, name)),
        },
        _ => Err(no_method(receiver, name)),
    }
}

/// Call a method that modifies its receiver.
pub fn call_mutating_method(
    receiver: &mut Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, FragmentError> {
    match (receiver, name) {
        (Value::List(items), "append") => {
            check_arity(name, &args, 1, 1)?;
            items.extend(args);
            Ok(Value::None)
        }
        (Value::List(items), "extend") => {
            check_arity(name, &args, 1, 1)?;
            items.extend(iterate(&args[0])?);
            Ok(Value::None)
        }
        (Value::List(items), "pop") => {
            check_arity(name, &args, 0, 1)?;
            if items.is_empty() {
                return Err(FragmentError::new(FragmentErrorKind::Index, "pop from empty list"));
            }
            let i = match args.first() {
                Some(idx) => normalize_index(idx, items.len())?,
                None => items.len() - 1,
            };
            Ok(items.remove(i))
        }
        (Value::Dict(entries), "update") => {
            check_arity(name, &args, 1, 1)?;
            let Value::Dict(incoming) = &args[0] else {
                return Err(FragmentError::type_error(format!(
                    "update() expects a dict, not '{}'",
                    args[0].type_name()
                )));
            };
            for (k, v) in incoming {
                match entries.iter_mut().find(|(existing, _)| existing.loose_eq(k)) {
                    Some((_, slot)) => *slot = v.clone(),
                    None => entries.push((k.clone(), v.clone())),
                }
            }
            Ok(Value::None)
        }
        (receiver, _) => Err(no_method(receiver, name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_division_semantics() {
        assert_eq!(binary(BinaryOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
        assert_eq!(binary(BinaryOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(binary(BinaryOp::Mod, &Value::Int(-7), &Value::Int(3)).unwrap(), Value::Int(2));
        let err = binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::DivisionByZero);
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = binary(BinaryOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);
    }

    #[test]
    fn test_huge_repetition_is_overflow() {
        let err = binary(BinaryOp::Mul, &Value::from("ab"), &Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);

        let err = binary(BinaryOp::Mul, &Value::Int(1 << 40), &Value::from(vec![1i64])).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);

        assert_eq!(
            binary(BinaryOp::Mul, &Value::from("ab"), &Value::Int(-3)).unwrap(),
            Value::from("")
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Value::Int(2), &Value::from(vec![1i64])).unwrap(),
            Value::from(vec![1i64, 1])
        );
    }

    #[test]
    fn test_huge_range_is_overflow() {
        let err = call_function("range", vec![Value::Int(i64::MAX)]).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);
        assert_eq!(
            call_function("range", vec![Value::Int(5), Value::Int(0), Value::Int(-2)]).unwrap(),
            Value::from(vec![5i64, 3, 1])
        );
    }

    #[test]
    fn test_float_to_int_out_of_range() {
        let err = call_function("int", vec![Value::Float(1e300)]).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);
        let err = call_function("int", vec![Value::Float(-1e19)]).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);
        let err = call_function("round", vec![Value::Float(1e300)]).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Overflow);
        assert_eq!(
            call_function("int", vec![Value::Float(-2.9)]).unwrap(),
            Value::Int(-2)
        );
    }

    #[test]
    fn test_string_ops() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::from("a"), &Value::from("b")).unwrap(),
            Value::from("ab")
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Value::from("ab"), &Value::Int(2)).unwrap(),
            Value::from("abab")
        );
        let err = binary(BinaryOp::Add, &Value::from("a"), &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, FragmentErrorKind::Type);
    }

    #[test]
    fn test_negative_index() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert_eq!(index(&list, &Value::Int(-1)).unwrap(), Value::Int(3));
        assert_eq!(index(&list, &Value::Int(3)).unwrap_err().kind, FragmentErrorKind::Index);
    }

    #[test]
    fn test_builtin_functions() {
        assert_eq!(call_function("len", vec![Value::from("héllo")]).unwrap(), Value::Int(5));
        assert_eq!(
            call_function("range", vec![Value::Int(3)]).unwrap(),
            Value::from(vec![0i64, 1, 2])
        );
        assert_eq!(
            call_function("sum", vec![Value::from(vec![1i64, 2, 3])]).unwrap(),
            Value::Int(6)
        );
        assert_eq!(
            call_function("max", vec![Value::Int(1), Value::Float(2.5)]).unwrap(),
            Value::Float(2.5)
        );
        assert_eq!(
            call_function("sorted", vec![Value::from(vec![3i64, 1, 2])]).unwrap(),
            Value::from(vec![1i64, 2, 3])
        );
        assert_eq!(
            call_function("int", vec![Value::from(" 42 ")]).unwrap(),
            Value::Int(42)
        );
        assert_eq!(
            call_function("nope", vec![]).unwrap_err().kind,
            FragmentErrorKind::Name
        );
    }

    #[test]
    fn test_sorted_mixed_types_fails() {
        let mixed = Value::List(vec![Value::Int(1), Value::from("a")]);
        assert!(call_function("sorted", vec![mixed]).is_err());
    }

    #[test]
    fn test_methods() {
        let s = Value::from("a,b");
        assert_eq!(
            call_method(&s, "split", &[Value::from(",")]).unwrap(),
            Value::from(vec!["a", "b"])
        );
        assert_eq!(
            call_method(&Value::from("-"), "join", &[Value::from(vec!["x", "y"])]).unwrap(),
            Value::from("x-y")
        );

        let mut list = Value::from(vec![1i64]);
        call_mutating_method(&mut list, "append", vec![Value::Int(2)]).unwrap();
        assert_eq!(list, Value::from(vec![1i64, 2]));
        assert_eq!(call_mutating_method(&mut list, "pop", vec![]).unwrap(), Value::Int(2));
    }
}

//! Host interface: output and native functions
//!
//! The interpreter never touches stdout or the standard library directly; every
//! `Print` and `CallNative` goes through a [`Host`].

use std::io::{self, Write};

use crate::value::{Value, kinds};

/// Failure of a native call
#[derive(Debug, Clone)]
pub enum NativeError {
    /// Raise the value as an in-language exception
    Throw(Value),
    /// No native function with this name
    Unknown(String),
}

/// Result of a native call
pub type NativeResult = Result<Value, NativeError>;

/// Services the interpreter needs from its embedder
pub trait Host {
    /// Write the display form of a printed value
    fn print(&mut self, text: &str, newline: bool) -> io::Result<()>;

    /// Invoke a native function by name
    fn call_native(&mut self, name: &str, args: &[Value]) -> NativeResult;
}

fn throw(kind: &str, message: impl Into<String>) -> NativeError {
    NativeError::Throw(Value::exception(kind, message))
}

fn arg<'a>(name: &str, args: &'a [Value], i: usize) -> Result<&'a Value, NativeError> {
    args.get(i).ok_or_else(|| {
        throw(
            kinds::ILLEGAL_ARGUMENT,
            format!("{name}() expects at least {} arguments", i + 1),
        )
    })
}

fn str_arg<'a>(name: &str, args: &'a [Value], i: usize) -> Result<&'a str, NativeError> {
    match arg(name, args, i)? {
        Value::Str(s) => Ok(&**s),
        other => Err(throw(
            kinds::TYPE,
            format!("{name}() expects a string, got {}", other.type_name()),
        )),
    }
}

fn int_arg(name: &str, args: &[Value], i: usize) -> Result<i64, NativeError> {
    match arg(name, args, i)? {
        Value::Int(n) => Ok(*n),
        other => Err(throw(
            kinds::TYPE,
            format!("{name}() expects an integer, got {}", other.type_name()),
        )),
    }
}

fn num_arg<'a>(name: &str, args: &'a [Value], i: usize) -> Result<&'a Value, NativeError> {
    let value = arg(name, args, i)?;
    if value.is_number() {
        Ok(value)
    } else {
        Err(throw(
            kinds::TYPE,
            format!("{name}() expects a number, got {}", value.type_name()),
        ))
    }
}

fn pick(name: &str, args: &[Value], want_greater: bool) -> NativeResult {
    let a = num_arg(name, args, 0)?;
    let b = num_arg(name, args, 1)?;
    if let (Value::Int(x), Value::Int(y)) = (a, b) {
        return Ok(Value::Int(if want_greater { *x.max(y) } else { *x.min(y) }));
    }
    let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
    Ok(Value::Float(if want_greater { x.max(y) } else { x.min(y) }))
}

/// Standard natives, shared by every host
pub fn std_native(name: &str, args: &[Value]) -> NativeResult {
    match name {
        "abs" => match num_arg(name, args, 0)? {
            Value::Int(n) => Ok(Value::Int(n.wrapping_abs())),
            other => Ok(Value::Float(other.as_f64().unwrap_or(f64::NAN).abs())),
        },
        "max" => pick(name, args, true),
        "min" => pick(name, args, false),
        "sqrt" => {
            let n = num_arg(name, args, 0)?.as_f64().unwrap_or(f64::NAN);
            if n < 0.0 {
                return Err(throw(
                    kinds::ILLEGAL_ARGUMENT,
                    "sqrt() cannot be called with a negative number",
                ));
            }
            Ok(Value::Float(n.sqrt()))
        }
        "length" => match arg(name, args, 0)? {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::Array(items) => Ok(Value::Int(items.borrow().len() as i64)),
            other => Err(throw(
                kinds::TYPE,
                format!("length() expects a string or array, got {}", other.type_name()),
            )),
        },
        "toString" => Ok(Value::str(&arg(name, args, 0)?.to_string())),
        "substring" => {
            let s = str_arg(name, args, 0)?;
            let start = int_arg(name, args, 1)?;
            let end = int_arg(name, args, 2)?;
            let len = s.chars().count() as i64;
            if start < 0 || end > len || start > end {
                return Err(throw(
                    kinds::INDEX_OUT_OF_BOUNDS,
                    format!("substring({start}, {end}) out of bounds for length {len}"),
                ));
            }
            let sub: String = s
                .chars()
                .skip(start as usize)
                .take((end - start) as usize)
                .collect();
            Ok(Value::str(&sub))
        }
        "charAt" => {
            let s = str_arg(name, args, 0)?;
            let idx = int_arg(name, args, 1)?;
            usize::try_from(idx)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                .ok_or_else(|| {
                    throw(
                        kinds::INDEX_OUT_OF_BOUNDS,
                        format!("charAt({idx}) out of bounds"),
                    )
                })
        }
        "toUpperCase" => Ok(Value::str(&str_arg(name, args, 0)?.to_uppercase())),
        "toLowerCase" => Ok(Value::str(&str_arg(name, args, 0)?.to_lowercase())),
        _ => Err(NativeError::Unknown(name.to_string())),
    }
}

/// Host that writes to any [`Write`] sink and provides [`std_native`]
#[derive(Debug, Default)]
pub struct StdHost<W: Write> {
    out: W,
}

impl<W: Write> StdHost<W> {
    /// Create a host writing to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the output sink
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl StdHost<Vec<u8>> {
    /// Host capturing output in memory
    pub fn capture() -> Self {
        Self::new(Vec::new())
    }

    /// Captured output so far, lossily decoded
    pub fn captured(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl<W: Write> Host for StdHost<W> {
    fn print(&mut self, text: &str, newline: bool) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        if newline {
            self.out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn call_native(&mut self, name: &str, args: &[Value]) -> NativeResult {
        std_native(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        std_native(name, args).expect("native call")
    }

    fn thrown_kind(result: NativeResult) -> String {
        match result {
            Err(NativeError::Throw(Value::Exception(e))) => e.kind.clone(),
            other => panic!("expected a thrown exception, got {other:?}"),
        }
    }

    #[test]
    fn test_math() {
        assert!(matches!(call("abs", &[Value::Int(-3)]), Value::Int(3)));
        assert!(matches!(call("max", &[Value::Int(2), Value::Int(7)]), Value::Int(7)));
        assert!(matches!(
            call("min", &[Value::Int(2), Value::Float(1.5)]),
            Value::Float(f) if f == 1.5
        ));
        assert!(matches!(call("sqrt", &[Value::Int(9)]), Value::Float(f) if f == 3.0));
        assert_eq!(
            thrown_kind(std_native("sqrt", &[Value::Int(-1)])),
            kinds::ILLEGAL_ARGUMENT
        );
        assert_eq!(thrown_kind(std_native("abs", &[Value::str("x")])), kinds::TYPE);
    }

    #[test]
    fn test_strings() {
        assert_eq!(call("toUpperCase", &[Value::str("abc")]).to_string(), "ABC");
        assert_eq!(call("toLowerCase", &[Value::str("AbC")]).to_string(), "abc");
        assert_eq!(
            call("substring", &[Value::str("hello"), Value::Int(1), Value::Int(3)]).to_string(),
            "el"
        );
        assert_eq!(call("charAt", &[Value::str("héllo"), Value::Int(1)]).to_string(), "é");
        assert!(matches!(call("length", &[Value::str("héllo")]), Value::Int(5)));
        assert_eq!(call("toString", &[Value::Float(2.0)]).to_string(), "2.0");
        assert_eq!(
            thrown_kind(std_native("charAt", &[Value::str("ab"), Value::Int(2)])),
            kinds::INDEX_OUT_OF_BOUNDS
        );
        assert_eq!(
            thrown_kind(std_native(
                "substring",
                &[Value::str("ab"), Value::Int(2), Value::Int(1)]
            )),
            kinds::INDEX_OUT_OF_BOUNDS
        );
    }

    #[test]
    fn test_missing_argument_throws() {
        assert_eq!(thrown_kind(std_native("max", &[Value::Int(1)])), kinds::ILLEGAL_ARGUMENT);
    }

    #[test]
    fn test_unknown_native() {
        assert!(matches!(
            std_native("launchMissiles", &[]),
            Err(NativeError::Unknown(name)) if name == "launchMissiles"
        ));
    }

    #[test]
    fn test_capture_host_prints() {
        let mut host = StdHost::capture();
        host.print("a", false).unwrap();
        host.print("b", true).unwrap();
        assert_eq!(host.captured(), "ab\n");
    }
}

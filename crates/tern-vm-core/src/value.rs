//! Runtime values
//!
//! Scalars are stored inline. Arrays and objects are shared by reference
//! (`Rc<RefCell<..>>`), so copying a slot aliases the same storage. Exceptions
//! are immutable once created.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tern_vm_bytecode::Constant;

/// Exception kinds raised by the VM itself
pub mod kinds {
    /// Integer division by zero
    pub const ARITHMETIC: &str = "ArithmeticException";
    /// Array index or size out of range
    pub const INDEX_OUT_OF_BOUNDS: &str = "IndexOutOfBoundsException";
    /// Operand of the wrong type
    pub const TYPE: &str = "TypeException";
    /// Field access on a non-object
    pub const NULL_POINTER: &str = "NullPointerException";
    /// Invalid argument passed to a native function
    pub const ILLEGAL_ARGUMENT: &str = "IllegalArgumentException";
}

/// Typed exception payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    /// Kind name, e.g. `ArithmeticException`
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl Exception {
    /// Create an exception payload
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Instance of a class, created by `NewObject`
#[derive(Debug, Clone, Default)]
pub struct ObjectData {
    /// Class name
    pub class: Rc<str>,
    /// Instance fields; unset fields read as `Void`
    pub fields: FxHashMap<Rc<str>, Value>,
}

/// A VM value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value, printed as `null`
    #[default]
    Void,
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Immutable string
    Str(Rc<str>),
    /// Shared mutable array
    Array(Rc<RefCell<Vec<Value>>>),
    /// Shared mutable object
    Object(Rc<RefCell<ObjectData>>),
    /// Thrown exception payload
    Exception(Rc<Exception>),
}

impl Value {
    /// Create a string value
    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    /// Create an empty object of `class`
    pub fn object(class: &str) -> Self {
        Self::Object(Rc::new(RefCell::new(ObjectData {
            class: Rc::from(class),
            fields: FxHashMap::default(),
        })))
    }

    /// Create an exception value
    pub fn exception(kind: &str, message: impl Into<String>) -> Self {
        Self::Exception(Rc::new(Exception::new(kind, message)))
    }

    /// Materialize a pool constant
    pub fn from_constant(constant: &Constant) -> Self {
        match constant {
            Constant::Null => Self::Void,
            Constant::Int(n) => Self::Int(*n),
            Constant::Float(n) => Self::Float(*n),
            Constant::String(s) => Self::str(s),
            Constant::Bool(b) => Self::Bool(*b),
        }
    }

    /// Default element for a declared array element type
    pub fn default_for(elem_type: Option<&str>) -> Self {
        match elem_type {
            None | Some("num") => Self::Int(0),
            Some("duo") => Self::Float(0.0),
            Some("kya") => Self::Bool(false),
            Some("sab") => Self::str(""),
            Some("ek") => Self::str("\0"),
            Some(_) => Self::Void,
        }
    }

    /// Only `false` is falsy; zero, empty strings and `Void` are truthy
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false))
    }

    /// Short type name for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "null",
            Self::Int(_) => "num",
            Self::Float(_) => "duo",
            Self::Bool(_) => "kya",
            Self::Str(_) => "sab",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Exception(_) => "exception",
        }
    }

    /// Numeric view, promoting integers
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether the value is an integer or a float
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Equality used by `Eq`/`Neq`
    ///
    /// Scalars compare structurally, integers and floats numerically.
    /// Arrays, objects and exceptions compare by identity.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Void, Self::Void) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Ordering used by `Lt`/`Le`/`Gt`/`Ge`
    ///
    /// `Ok(None)` when both are numbers but unordered (NaN).
    pub fn ordering(&self, other: &Value) -> Result<Option<Ordering>, Incomparable> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Ok(Some(a.cmp(b))),
            (Self::Str(a), Self::Str(b)) => Ok(Some(a.cmp(b))),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(x.partial_cmp(&y)),
                _ => Err(Incomparable),
            },
        }
    }
}

/// Operands of `Lt`/`Le`/`Gt`/`Ge` with no common ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incomparable;

/// Render a float the way the language prints it: `3.0`, `NaN`, `Infinity`
pub fn format_float(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{n:?}")
    }
}

/// Nesting depth past which arrays print as `[...]`; arrays may contain themselves
const MAX_DISPLAY_DEPTH: usize = 32;

fn write_value(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Void => f.write_str("null"),
        Value::Int(n) => write!(f, "{n}"),
        Value::Float(n) => f.write_str(&format_float(*n)),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Str(s) => f.write_str(s),
        Value::Array(_) if depth >= MAX_DISPLAY_DEPTH => f.write_str("[...]"),
        Value::Array(items) => {
            f.write_str("[")?;
            for (i, item) in items.borrow().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_value(f, item, depth + 1)?;
            }
            f.write_str("]")
        }
        Value::Object(obj) => write!(f, "<{}>", obj.borrow().class),
        Value::Exception(e) => write!(f, "{e}"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_value(f, self, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(Value::Int(0).is_truthy());
        assert!(Value::Void.is_truthy());
        assert!(Value::str("").is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Void.to_string(), "null");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(
            Value::array(vec![Value::Int(1), Value::str("a")]).to_string(),
            "[1, a]"
        );
        assert_eq!(Value::object("Point").to_string(), "<Point>");
        assert_eq!(
            Value::exception(kinds::ARITHMETIC, "/ by zero").to_string(),
            "ArithmeticException: / by zero"
        );
    }

    #[test]
    fn test_defaults() {
        assert!(matches!(Value::default_for(None), Value::Int(0)));
        assert!(matches!(Value::default_for(Some("num")), Value::Int(0)));
        assert!(matches!(Value::default_for(Some("duo")), Value::Float(f) if f == 0.0));
        assert!(matches!(Value::default_for(Some("kya")), Value::Bool(false)));
        assert_eq!(Value::default_for(Some("sab")).to_string(), "");
        assert!(matches!(Value::default_for(Some("Point")), Value::Void));
    }

    #[test]
    fn test_equality() {
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert!(Value::str("x").loose_eq(&Value::str("x")));
        assert!(!Value::Int(1).loose_eq(&Value::str("1")));

        let a = Value::array(vec![]);
        let b = Value::array(vec![]);
        assert!(a.loose_eq(&a.clone()));
        assert!(!a.loose_eq(&b));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(
            Value::Int(1).ordering(&Value::Float(1.5)),
            Ok(Some(Ordering::Less))
        );
        assert_eq!(
            Value::str("b").ordering(&Value::str("a")),
            Ok(Some(Ordering::Greater))
        );
        assert_eq!(Value::Float(f64::NAN).ordering(&Value::Int(0)), Ok(None));
        assert_eq!(Value::Bool(true).ordering(&Value::Int(0)), Err(Incomparable));
    }

    #[test]
    fn test_shared_array_aliasing() {
        let a = Value::array(vec![Value::Int(0)]);
        let alias = a.clone();
        if let Value::Array(items) = &alias {
            items.borrow_mut()[0] = Value::Int(9);
        }
        assert_eq!(a.to_string(), "[9]");
    }

    #[test]
    fn test_self_referential_array_display_terminates() {
        let a = Value::array(vec![Value::Int(1)]);
        if let Value::Array(items) = &a {
            items.borrow_mut().push(a.clone());
        }
        assert!(a.to_string().contains("[...]"));
    }
}

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{self, Debug, Display},
    ops::{Add, Div, Mul, Sub},
    rc::Rc,
};

use super::callable::Callable;

#[derive(Clone)]
pub enum Value {
    /// The undefined sentinel, also what unbound names read as
    None,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    // Lists are shared, an index write is seen by every binding of the same list
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<BTreeMap<String, Value>>),
    Function(Rc<dyn Callable>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0f64 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_function(&self) -> Option<Rc<dyn Callable>> {
        match self {
            Value::Function(callable) => Some(callable.clone()),
            _ => None,
        }
    }

    /// A usable position for indexing: a finite, non-negative whole number
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Value::Number(n) if n.is_finite() && *n >= 0f64 && n.fract() == 0f64 => Some(*n as usize),
            _ => None,
        }
    }

    /// Whether `list` can be reached from this value through lists and maps
    pub fn reaches(&self, list: &Rc<RefCell<Vec<Value>>>) -> bool {
        match self {
            Value::List(items) => Rc::ptr_eq(items, list) || items.borrow().iter().any(|item| item.reaches(list)),
            Value::Map(map) => map.values().any(|value| value.reaches(list)),
            _ => false,
        }
    }

    /// Read the element at `index`, yielding none for anything that can't be indexed
    pub fn element_at(&self, index: &Value) -> Value {
        match (self, index) {
            (Value::Map(map), Value::String(key)) => map.get(&**key).cloned().unwrap_or(Value::None),
            (Value::List(items), index) => index
                .as_index()
                .and_then(|i| items.borrow().get(i).cloned())
                .unwrap_or(Value::None),
            (Value::String(s), index) => index
                .as_index()
                .and_then(|i| s.chars().nth(i))
                .map(|ch| Value::String(Rc::from(ch.to_string())))
                .unwrap_or(Value::None),
            _ => Value::None,
        }
    }

    // Strings nested in containers are quoted so `(list "1" 1)` reads unambiguously
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            other => Display::fmt(other, f),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (i, (name, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    value.fmt_nested(f)?;
                }
                f.write_str("}")
            }
            Value::Function(func) if func.is_native() => write!(f, "<native {}>", func.name()),
            Value::Function(func) => write!(f, "<{}>", func.name()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("Value::None"),
            Value::Bool(b) => write!(f, "Value::Bool({})", b),
            Value::Number(n) => write!(f, "Value::Number({})", n),
            Value::String(s) => write!(f, "Value::String({:?})", s),
            Value::List(items) => write!(f, "Value::List({:?})", items.borrow()),
            Value::Map(map) => write!(f, "Value::Map({:?})", map),
            Value::Function(func) => write!(f, "Value::Function({})", func.name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::List(left), Self::List(right)) => {
                Rc::ptr_eq(left, right) || *left.borrow() == *right.borrow()
            }
            (Self::Map(left), Self::Map(right)) => left == right,
            (Self::Function(left), Self::Function(right)) => Rc::ptr_eq(left, right),
            // All type mismatches not equal
            _ => false,
        }
    }
}

const NAN: Value = Value::Number(f64::NAN);

// Starting here are convenience implementations to make the arithmetic fold easier
impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => Value::Number(l + r),
            (Value::String(l), r) => {
                let mut new = l.to_string();
                new.push_str(&r.to_string());
                Value::String(Rc::from(new))
            }
            (l, Value::String(r)) => {
                let mut new = l.to_string();
                new.push_str(&r);
                Value::String(Rc::from(new))
            }
            _ => NAN,
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => Value::Number(l - r),
            _ => NAN,
        }
    }
}

impl Mul for Value {
    type Output = Value;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Value::Number(l), Value::Number(r)) => Value::Number(l * r),
            _ => NAN,
        }
    }
}

impl Div for Value {
    type Output = Value;

    fn div(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            // Division by zero follows f64 and lands on an infinity
            (Value::Number(l), Value::Number(r)) => Value::Number(l / r),
            _ => NAN,
        }
    }
}

pub fn lt(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => l < r,
        (Value::Number(l), Value::Number(r)) => l < r,
        _ => false,
    }
}

pub fn gt(lhs: &Value, rhs: &Value) -> bool {
    lt(rhs, lhs)
}

pub fn le(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => l <= r,
        (Value::Number(l), Value::Number(r)) => l <= r,
        _ => false,
    }
}

pub fn ge(lhs: &Value, rhs: &Value) -> bool {
    le(rhs, lhs)
}

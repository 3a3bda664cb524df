use std::{collections::BTreeMap, collections::HashMap, rc::Rc};

use thiserror::Error;

use super::runtime::RuntimeError;
use super::value::Value;

pub type Frame = HashMap<String, Value>;

/// How far past the end of a list a single indexed write may pad
pub const MAX_LIST_GROWTH: usize = 1 << 16;

/// Why an indexed write was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexWriteError {
    #[error("{0} is neither a list nor a string")]
    NotIndexable(String),
    #[error("index {0} is not a non-negative whole number")]
    BadIndex(String),
    #[error("index {0} is out of range")]
    OutOfRange(usize),
    #[error("a list can't be stored inside itself")]
    Cycle,
    #[error("a string position can only hold a single character, got {0:?}")]
    NotOneCharacter(String),
}

/// The stack of variable frames
///
/// Every frame behaves as if it were a copy of all the frames below it merged together: reads see the newest binding
/// of a name anywhere on the stack and writes only ever land in the top frame. Since frames below the top are never
/// written while the top is live, searching the chain from the top is the same as copying on push.
pub struct ScopeManager {
    // frames[0] is the base frame and lives as long as the manager
    frames: Vec<Frame>,
}

impl Default for ScopeManager {
    fn default() -> Self {
        ScopeManager::new()
    }
}

impl ScopeManager {
    pub fn new() -> ScopeManager {
        ScopeManager {
            frames: vec![Frame::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn pop(&mut self) -> Result<(), RuntimeError> {
        if self.frames.len() <= 1 {
            return Err(RuntimeError::Invariant("attempted to pop the base frame"));
        }
        self.frames.pop();
        Ok(())
    }

    pub fn read(&self, name: &str) -> Value {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .cloned()
            .unwrap_or(Value::None)
    }

    pub fn write(&mut self, name: &str, value: Value) {
        self.top().insert(name.to_string(), value);
    }

    /// Write through the indexes in `path`, starting at the value bound to `name`
    /// Lists are updated in place. A string can't be updated in place so a new string is built and `name` (or the
    /// enclosing list slot) is rebound to it.
    pub fn write_indexed(&mut self, name: &str, path: &[Value], value: Value) -> Result<(), IndexWriteError> {
        let root = self.read(name);
        if let Some(replacement) = assign(&root, path, value)? {
            self.write(name, replacement);
        }
        Ok(())
    }

    /// The merged view of every live frame
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        for frame in self.frames.iter() {
            for (name, value) in frame.iter() {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    fn top(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

// Returns the value that should replace `container` when it could not be updated in place
fn assign(container: &Value, path: &[Value], value: Value) -> Result<Option<Value>, IndexWriteError> {
    let Some((index, rest)) = path.split_first() else {
        return Ok(Some(value));
    };
    match container {
        Value::List(items) => {
            let i = index
                .as_index()
                .ok_or_else(|| IndexWriteError::BadIndex(index.to_string()))?;
            if rest.is_empty() {
                // Lists stay acyclic so equality and display always terminate
                if value.reaches(items) {
                    return Err(IndexWriteError::Cycle);
                }
                let mut items = items.borrow_mut();
                if i >= items.len() {
                    if i - items.len() > MAX_LIST_GROWTH {
                        return Err(IndexWriteError::OutOfRange(i));
                    }
                    items.resize(i + 1, Value::None);
                }
                items[i] = value;
                return Ok(None);
            }
            let child = items.borrow().get(i).cloned().unwrap_or(Value::None);
            if let Some(replacement) = assign(&child, rest, value)? {
                items.borrow_mut()[i] = replacement;
            }
            Ok(None)
        }
        Value::String(s) if rest.is_empty() => {
            let i = index
                .as_index()
                .ok_or_else(|| IndexWriteError::BadIndex(index.to_string()))?;
            let replacement = match &value {
                Value::String(r) if r.chars().count() == 1 => r.clone(),
                other => return Err(IndexWriteError::NotOneCharacter(other.to_string())),
            };
            let mut chars: Vec<char> = s.chars().collect();
            if i >= chars.len() {
                return Err(IndexWriteError::OutOfRange(i));
            }
            chars.splice(i..=i, replacement.chars());
            Ok(Some(Value::String(Rc::from(chars.into_iter().collect::<String>()))))
        }
        other => Err(IndexWriteError::NotIndexable(other.to_string())),
    }
}

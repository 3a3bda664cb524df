use std::fmt::{self, Display};

use ordered_float::OrderedFloat;

use crate::scanner::Pos;

/// A node of the tree: either a leaf token or a nested block
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Block(Block),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub pos: Pos,
    pub inner: ElementInner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementInner {
    Word(String),
    Number(OrderedFloat<f64>),
    String(String),
    Keyword(Keyword),
}

impl Element {
    /// The raw text of the element, used wherever a name is wanted rather than a value
    pub fn text(&self) -> String {
        match &self.inner {
            ElementInner::Word(word) => word.clone(),
            ElementInner::String(string) => string.clone(),
            ElementInner::Number(OrderedFloat(number)) => number.to_string(),
            ElementInner::Keyword(keyword) => keyword.literal().to_string(),
        }
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.inner {
            ElementInner::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }
}

/// An ordered sequence of nodes
/// When the first member is an element the block is a form headed by that element, otherwise it is a sequence of
/// statements
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub pos: Pos,
    pub members: Vec<Node>,
}

impl Block {
    pub fn new(pos: Pos, members: Vec<Node>) -> Block {
        Block { pos, members }
    }

    pub fn head(&self) -> Option<&Element> {
        match self.members.first() {
            Some(Node::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub fn is_scope(&self) -> bool {
        self.head().and_then(Element::keyword) == Some(Keyword::Scope)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Scope,
    Let,
    Fn,
    Return,
    If,
    While,
    List,
    Index,
    Import,
    None,
    Stack,
    True,
    False,
    Arith(ArithOp),
    Compare(CompareOp),
    Logical(LogicalOp),
}

const KEYWORD_LITERALS: [(&str, Keyword); 25] = [
    ("{", Keyword::Scope),
    ("let", Keyword::Let),
    ("fn", Keyword::Fn),
    ("return", Keyword::Return),
    ("if", Keyword::If),
    ("while", Keyword::While),
    ("list", Keyword::List),
    ("index", Keyword::Index),
    ("import", Keyword::Import),
    ("none", Keyword::None),
    ("stack", Keyword::Stack),
    ("true", Keyword::True),
    ("false", Keyword::False),
    ("+", Keyword::Arith(ArithOp::Add)),
    ("-", Keyword::Arith(ArithOp::Subtract)),
    ("*", Keyword::Arith(ArithOp::Multiply)),
    ("/", Keyword::Arith(ArithOp::Divide)),
    ("=", Keyword::Compare(CompareOp::Equal)),
    ("!=", Keyword::Compare(CompareOp::NotEqual)),
    ("<", Keyword::Compare(CompareOp::LessThan)),
    (">", Keyword::Compare(CompareOp::GreaterThan)),
    ("<=", Keyword::Compare(CompareOp::LessThanEqual)),
    (">=", Keyword::Compare(CompareOp::GreaterThanEqual)),
    ("and", Keyword::Logical(LogicalOp::And)),
    ("or", Keyword::Logical(LogicalOp::Or)),
];

impl Keyword {
    pub fn from_literal(literal: &str) -> Option<Keyword> {
        KEYWORD_LITERALS
            .iter()
            .find(|(lit, _)| *lit == literal)
            .map(|(_, keyword)| *keyword)
    }

    pub fn literal(&self) -> &'static str {
        KEYWORD_LITERALS
            .iter()
            .find(|(_, keyword)| keyword == self)
            .map(|(lit, _)| *lit)
            .unwrap_or("?")
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            ElementInner::Word(word) => f.write_str(word),
            ElementInner::Number(OrderedFloat(number)) => write!(f, "{}", number),
            ElementInner::String(string) => write!(f, "{:?}", string),
            ElementInner::Keyword(keyword) => keyword.fmt(f),
        }
    }
}

impl Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close, members) = if self.is_scope() {
            ("{", "}", &self.members[1..])
        } else {
            ("(", ")", &self.members[..])
        };
        f.write_str(open)?;
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", member)?;
        }
        f.write_str(close)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(element) => element.fmt(f),
            Node::Block(block) => block.fmt(f),
        }
    }
}

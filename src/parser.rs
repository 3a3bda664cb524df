use std::io::Write;

use crate::ast::{Block, Element, ElementInner, Keyword, Node};
use crate::scanner::{Data, Pos, ScanError, Scanner, Token};
use ordered_float::OrderedFloat;
use thiserror::Error;

// Public error type that is returned from the API
#[derive(Error, Debug)]
#[error("parse error")]
pub struct Error {}

// For unwinding, we don't actually care that much about the internal cause which is reported through the reporter
#[derive(Error, Debug)]
#[error("internal parse error")]
struct ParsePanic {}

pub trait ErrorReporter {
    fn report(&mut self, pos: Pos, message: &str);
}

pub struct WriteErrorReporter<'w, W>
where
    W: Write,
{
    // Store this as a mut reference so we can't accidentally lose something like stderr().lock() inside the reporter
    // that doesn't go out of scope and cause a deadlock
    write: &'w mut W,
}

impl<'w, W> WriteErrorReporter<'w, W>
where
    W: Write,
{
    pub fn new(write: &'w mut W) -> WriteErrorReporter<'w, W> {
        WriteErrorReporter { write }
    }
}

impl<'w, W> ErrorReporter for WriteErrorReporter<'w, W>
where
    W: Write,
{
    fn report(&mut self, pos: Pos, message: &str) {
        // If we can't write to our output: 🤷🏻‍♂️
        _ = writeln!(self.write, "error at {}: {}", pos, message);
    }
}

/// Keeps every reported message so the caller can fold them into its own error
#[derive(Debug, Default)]
pub struct CollectingErrorReporter {
    pub messages: Vec<String>,
}

impl ErrorReporter for CollectingErrorReporter {
    fn report(&mut self, pos: Pos, message: &str) {
        self.messages.push(format!("error at {}: {}", pos, message));
    }
}

/// Track whether or not an error actually occurred and delegate to another error reporter
/// This is only meant to be used internally so that parse can piggy back on whether an error actually occurred
struct StateTrackingReporter<'a, Reporter> {
    reporter: &'a mut Reporter,
    errored: bool,
}

impl<'a, Reporter> ErrorReporter for StateTrackingReporter<'a, Reporter>
where
    Reporter: ErrorReporter,
{
    fn report(&mut self, pos: Pos, message: &str) {
        self.errored = true;
        self.reporter.report(pos, message);
    }
}

type Tokens<'src> = Scanner<'src>;

/// Parse a whole program into the sequence block of its top-level nodes
pub fn parse<'src, Reporter>(reporter: &mut Reporter, mut scanner: Scanner<'src>) -> Result<Block, Error>
where
    Reporter: ErrorReporter,
{
    let mut reporter = StateTrackingReporter {
        reporter,
        errored: false,
    };
    match program(&mut reporter, &mut scanner) {
        Ok(program) if !reporter.errored => Ok(program),
        _ => Err(Error {}),
    }
}

fn program<'src, Reporter>(
    reporter: &mut Reporter,
    tokens: &mut Tokens<'src>,
) -> Result<Block, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let mut members = Vec::<Node>::new();
    loop {
        match next_token(reporter, tokens) {
            None => break,
            Some(Token {
                data: Data::Eof, ..
            }) => break,
            Some(Token {
                data: data @ (Data::RightParen | Data::RightBrace),
                pos,
            }) => {
                // Report and keep going so a stray closer doesn't hide later errors
                reporter.report(pos, &format!("unexpected {}", data));
            }
            Some(token) => members.push(node(reporter, tokens, token)?),
        }
    }
    Ok(Block::new(Pos::default(), members))
}

// Pull the next token, reporting and skipping any scan errors along the way
fn next_token<'src, Reporter>(reporter: &mut Reporter, tokens: &mut Tokens<'src>) -> Option<Token<'src>>
where
    Reporter: ErrorReporter,
{
    loop {
        match tokens.next()? {
            Ok(token) => return Some(token),
            Err(ScanError { error, pos }) => reporter.report(pos, &error.to_string()),
        }
    }
}

fn node<'src, Reporter>(
    reporter: &mut Reporter,
    tokens: &mut Tokens<'src>,
    token: Token<'src>,
) -> Result<Node, ParsePanic>
where
    Reporter: ErrorReporter,
{
    let Token { data, pos } = token;
    let inner = match data {
        Data::LeftParen => {
            let members = finish_block(reporter, tokens, pos, Data::RightParen, Vec::new())?;
            return Ok(Node::Block(Block::new(pos, members)));
        }
        Data::LeftBrace => {
            let head = Node::Element(Element {
                pos,
                inner: ElementInner::Keyword(Keyword::Scope),
            });
            let members = finish_block(reporter, tokens, pos, Data::RightBrace, vec![head])?;
            return Ok(Node::Block(Block::new(pos, members)));
        }
        Data::Word { word } => match Keyword::from_literal(word) {
            Some(keyword) => ElementInner::Keyword(keyword),
            None => ElementInner::Word(word.to_string()),
        },
        Data::Number { number } => ElementInner::Number(OrderedFloat(number)),
        Data::String { string } => ElementInner::String(string),
        Data::RightParen | Data::RightBrace | Data::Eof => {
            reporter.report(pos, &format!("unexpected {}", data));
            return Err(ParsePanic {});
        }
    };
    Ok(Node::Element(Element { pos, inner }))
}

fn finish_block<'src, Reporter>(
    reporter: &mut Reporter,
    tokens: &mut Tokens<'src>,
    open_pos: Pos,
    close: Data<'src>,
    mut members: Vec<Node>,
) -> Result<Vec<Node>, ParsePanic>
where
    Reporter: ErrorReporter,
{
    loop {
        match next_token(reporter, tokens) {
            Some(token) if token.data == close => return Ok(members),
            None
            | Some(Token {
                data: Data::Eof, ..
            }) => {
                reporter.report(open_pos, &format!("unclosed block, expected {}", close));
                return Err(ParsePanic {});
            }
            Some(Token {
                data: data @ (Data::RightParen | Data::RightBrace),
                pos,
            }) => {
                reporter.report(pos, &format!("expected {} but found {}", close, data));
                return Err(ParsePanic {});
            }
            Some(token) => members.push(node(reporter, tokens, token)?),
        }
    }
}

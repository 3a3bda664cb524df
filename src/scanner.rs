use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct Pos {
    pub offset_in_line: usize,
    pub line: usize,
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.offset_in_line)
    }
}

#[derive(Clone, Error, Debug, PartialEq, Eq)]
#[error("scan error: {error} at {pos}")]
pub struct ScanError {
    pub error: ScanErrorType,
    pub pos: Pos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanErrorType {
    UnterminatedString,
    UnknownEscape(char),
}

impl Display for ScanErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScanErrorType::UnterminatedString => f.write_str("unterminated string"),
            ScanErrorType::UnknownEscape(ch) => write!(f, "unknown escape '\\{}'", ch),
        }
    }
}

/// A token in the input stream
/// Contains a data which is the token variant and a position
/// Note that pos is always defined, but in the case of EOF will describe a location
/// Potentially off the end of the input stream
#[derive(Debug, PartialEq, Clone)]
pub struct Token<'code> {
    pub data: Data<'code>,
    pub pos: Pos,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Data<'code> {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Word { word: &'code str },
    // Escapes mean the string can't always borrow from the source
    String { string: String },
    Number { number: f64 },
    Eof,
}

impl<'code> Display for Data<'code> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Data::LeftParen => f.write_str("'('"),
            Data::RightParen => f.write_str("')'"),
            Data::LeftBrace => f.write_str("'{'"),
            Data::RightBrace => f.write_str("'}'"),
            Data::Word { word } => write!(f, "word '{}'", word),
            Data::String { .. } => f.write_str("string"),
            Data::Number { number } => write!(f, "number {}", number),
            Data::Eof => f.write_str("end of input"),
        }
    }
}

#[derive(Clone)]
pub struct Scanner<'lex> {
    code: &'lex str,
    code_iter: Peekable<CharIndices<'lex>>,
    emitted_eof: bool, // Have we sent the EOF yet

    line: usize,
    offset_in_line: usize,
}

const WS_CHARS: &str = " \r\t";

// Characters that end a word
const DELIMITERS: &str = "(){}\";";

impl<'lex> Scanner<'lex> {
    pub fn new(code: &'lex str) -> Scanner<'lex> {
        Scanner {
            code,
            code_iter: code.char_indices().peekable(),
            emitted_eof: false,
            line: 0,
            offset_in_line: 0,
        }
    }

    fn current_pos(&self) -> Pos {
        Pos {
            line: self.line,
            offset_in_line: self.offset_in_line,
        }
    }

    fn consume_next_char_if_match<F>(&mut self, predicate: F) -> bool
    where
        F: FnOnce(char) -> bool,
    {
        self.code_iter.next_if(|(_, ch)| predicate(*ch)).is_some()
    }

    fn gobble_whitespace(&mut self) {
        loop {
            if self.consume_next_char_if_match(|ch| WS_CHARS.contains(ch)) {
                self.offset_in_line += 1;
            } else if self.consume_next_char_if_match(|ch| ch == '\n') {
                self.offset_in_line = 0;
                self.line += 1;
            } else {
                break;
            }
        }
    }

    fn next_offset(&mut self) -> usize {
        self.code_iter
            .peek()
            .map(|(offset, _)| *offset)
            .unwrap_or(self.code.len())
    }

    fn word(&mut self, offset: usize, pos: Pos) -> Token<'lex> {
        let mut word_len = 1;
        while self.consume_next_char_if_match(|ch| !ch.is_whitespace() && !DELIMITERS.contains(ch)) {
            word_len += 1;
        }
        self.offset_in_line += word_len;
        let end = self.next_offset();
        let word = &self.code[offset..end];
        // Anything shaped like a number that fails to parse (1x, 2..3) stays a word
        let numeric = {
            let mut chars = word.chars();
            match chars.next() {
                Some('-') | Some('+') => chars.next().is_some_and(|ch| ch.is_ascii_digit()),
                Some(ch) => ch.is_ascii_digit(),
                None => false,
            }
        };
        let data = match word.parse::<f64>() {
            Ok(number) if numeric => Data::Number { number },
            _ => Data::Word { word },
        };
        Token { data, pos }
    }

    fn string(&mut self, pos: Pos) -> Result<Token<'lex>, ScanError> {
        let mut string = String::new();
        // Strings are multiline, so we need to track things like whether or not we cross a newline
        while let Some((_, ch)) = self.code_iter.next() {
            match ch {
                '\n' => {
                    string.push(ch);
                    self.offset_in_line = 0;
                    self.line += 1;
                }
                '"' => {
                    self.offset_in_line += 1;
                    return Ok(Token {
                        data: Data::String { string },
                        pos,
                    });
                }
                '\\' => {
                    self.offset_in_line += 2;
                    let escaped = match self.code_iter.next() {
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((_, '"')) => '"',
                        Some((_, '\\')) => '\\',
                        Some((_, other)) => {
                            // Keep scanning to the closing quote so we resume on a sane token
                            self.skip_string_tail();
                            return Err(ScanError {
                                error: ScanErrorType::UnknownEscape(other),
                                pos,
                            });
                        }
                        None => break,
                    };
                    string.push(escaped);
                }
                _ => {
                    string.push(ch);
                    self.offset_in_line += 1;
                }
            }
        }
        Err(ScanError {
            error: ScanErrorType::UnterminatedString,
            pos,
        })
    }

    fn skip_string_tail(&mut self) {
        while let Some((_, ch)) = self.code_iter.next() {
            match ch {
                '"' => {
                    self.offset_in_line += 1;
                    break;
                }
                '\n' => {
                    self.offset_in_line = 0;
                    self.line += 1;
                }
                _ => self.offset_in_line += 1,
            }
        }
    }
}

impl<'lex> Iterator for Scanner<'lex> {
    type Item = Result<Token<'lex>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.gobble_whitespace();
        let pos = self.current_pos();
        if let Some((offset, ch)) = self.code_iter.next() {
            let data = match ch {
                '(' => Data::LeftParen,
                ')' => Data::RightParen,
                '{' => Data::LeftBrace,
                '}' => Data::RightBrace,
                ';' => {
                    // Gobble the comment and then recursively call
                    // The newline is left in place for gobble_whitespace to count
                    while self.consume_next_char_if_match(|ch| ch != '\n') {
                        self.offset_in_line += 1;
                    }
                    self.offset_in_line += 1;
                    return self.next();
                }
                '"' => {
                    self.offset_in_line += 1;
                    return Some(self.string(pos));
                }
                _ => return Some(Ok(self.word(offset, pos))),
            };
            self.offset_in_line += 1;
            Some(Ok(Token { data, pos }))
        } else if !self.emitted_eof {
            self.emitted_eof = true;
            Some(Ok(Token {
                data: Data::Eof,
                pos,
            }))
        } else {
            None
        }
    }
}

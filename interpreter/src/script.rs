use common::constants::NANOSECONDS_PER_SECOND;

use lalrpop_util::ParseError;
use lalrpop_util::lexer::Token;
use thiserror::Error;

use crate::grammar::LineParser;

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("Unknown command `{0}`")]
    UnknownCommand(String),

    #[error("Found {found}, expected one of: {expected}")]
    Syntax { found: String, expected: String },

    #[error("Unexpected character `{0}`")]
    BadToken(char),

    #[error("Invalid number `{0}`")]
    BadNumber(String),

    #[error("Invalid duration `{0}`")]
    BadDuration(String),

    #[error("Value {0:#x} doesn't fit in {1} bits")]
    TooWide(u64, u32),

    #[error("Unterminated string or character literal")]
    Unterminated,

    #[error("Unknown escape `\\{0}`")]
    BadEscape(char),

    #[error("Unknown register `{0}`")]
    UnknownSymbol(String),

    #[error("Expected {expected:#010x} at {addr:#x}, read {actual:#010x}")]
    Mismatch { addr: u64, expected: u32, actual: u32 },

    #[error("Expected IRQ {line} to be {}", level_name(.expected))]
    IrqMismatch { line: u32, expected: bool },

    #[error("Writing output: {0}")]
    Output(#[from] std::io::Error),
}

fn level_name(level: &bool) -> &'static str {
    if *level { "raised" } else { "lowered" }
}

#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ScriptError {
    pub line: usize,
    pub kind: ErrorKind,
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addr {
    Abs(u64),
    Sym(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write { addr: Addr, val: u32 },
    Read { addr: Addr },
    Expect { addr: Addr, val: u32 },
    Advance(u64), // ns
    Rx(Vec<u8>),
    Break,
    Irq { line: u32, level: bool },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub num: usize, // 1 based
    pub cmd: Command,
}

pub fn parse(input: &str) -> Result<Vec<Line>, ScriptError> {
    let parser = LineParser::new();
    input
        .lines()
        .zip(1..)
        .map(|(text, num)| {
            parser
                .parse(text)
                .map(|cmd| cmd.map(|cmd| Line{num, cmd}))
                .map_err(|e| ScriptError{line: num, kind: syntax_error(text, e)})
        })
        .filter_map(Result::transpose)
        .collect()
}

pub(crate) fn user<L, T>(error: ErrorKind) -> ParseError<L, T, ErrorKind> {
    ParseError::User{error}
}

fn expected_list(expected: &[String]) -> String {
    if expected.is_empty() {
        return "end of line".to_string();
    }
    expected
        .iter()
        .map(|name| name.trim_matches('"'))
        .collect::<Vec<_>>()
        .join(", ")
}

fn syntax_error(text: &str, err: ParseError<usize, Token<'_>, ErrorKind>) -> ErrorKind {
    // Byte offset of the command word.
    let first = text.len() - text.trim_start().len();

    match err {
        ParseError::InvalidToken{location} => match text[location..].chars().next() {
            Some(c) if c != '"' && c != '\'' => ErrorKind::BadToken(c),
            _ => ErrorKind::Unterminated,
        },
        ParseError::UnrecognizedToken{token: (start, Token(_, found), _), ..} if start == first => {
            ErrorKind::UnknownCommand(found.to_string())
        }
        ParseError::UnrecognizedToken{token: (_, Token(_, found), _), expected} => ErrorKind::Syntax{
            found: format!("`{found}`"),
            expected: expected_list(&expected),
        },
        ParseError::UnrecognizedEof{expected, ..} => ErrorKind::Syntax{
            found: "end of line".to_string(),
            expected: expected_list(&expected),
        },
        ParseError::ExtraToken{token: (_, Token(_, found), _)} => ErrorKind::Syntax{
            found: format!("`{found}`"),
            expected: "end of line".to_string(),
        },
        ParseError::User{error} => error,
    }
}

// Body of a quoted literal, without the quotes.
pub(crate) fn unescape(body: &str) -> Result<Vec<u8>, ErrorKind> {
    let mut bytes = Vec::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        bytes.push(match chars.next().ok_or(ErrorKind::Unterminated)? {
            'n' => b'\n',
            'r' => b'\r',
            't' => b'\t',
            '0' => 0,
            '\\' => b'\\',
            '"' => b'"',
            '\'' => b'\'',
            c => return Err(ErrorKind::BadEscape(c)),
        });
    }
    Ok(bytes)
}

pub(crate) fn parse_num(text: &str) -> Result<u64, ErrorKind> {
    let clean = text.replace('_', "");
    let res = if let Some(hex) = clean.strip_prefix("0x").or_else(|| clean.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = clean.strip_prefix("0b").or_else(|| clean.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else {
        clean.parse()
    };
    res.map_err(|_| ErrorKind::BadNumber(text.to_string()))
}

pub(crate) fn parse_duration(text: &str) -> Result<u64, ErrorKind> {
    let bad = || ErrorKind::BadDuration(text.to_string());

    // Check the longer suffixes first; "ns" also ends in "s".
    let units: [(&str, u64); 4] = [
        ("ns", 1),
        ("us", 1_000),
        ("ms", 1_000_000),
        ("s", NANOSECONDS_PER_SECOND),
    ];
    let (digits, scale) = units
        .iter()
        .find_map(|&(suffix, scale)| text.strip_suffix(suffix).map(|d| (d, scale)))
        .unwrap_or((text, 1));

    let val = parse_num(digits).map_err(|_| bad())?;
    val.checked_mul(scale).ok_or_else(bad)
}

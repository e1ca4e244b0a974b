#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the hotplug emulator REPL.
//!
//! The lexer uses `regal` to produce a bounded token stream; commands are
//! recognised by walking that stream, and numeric literals are decoded with
//! `winnow` so duration suffixes are handled in one place.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::ascii::digit1;
use winnow::combinator::alt;
use winnow::error::ContextError;
use winnow::prelude::*;

/// Maximum number of tokens produced per REPL line. Commands remain short and bounded.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the REPL grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Unsuffixed integer literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarError<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        lexeme: &'a str,
    },
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        match token {
            Some(tok) if tok.kind != TokenKind::Eol => GrammarError::UnexpectedToken {
                expected,
                found: tok.kind,
                span: tok.span.clone(),
            },
            _ => GrammarError::UnexpectedEnd { expected },
        }
    }
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarError::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarError::UnknownCommand { lexeme } => write!(f, "unknown command `{lexeme}`"),
            GrammarError::InvalidInteger { span } => {
                write!(f, "invalid integer literal at {span:?}")
            }
            GrammarError::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarError::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Assert HPD and raise a hotplug event.
    Plug,
    /// De-assert HPD and raise a hotplug event.
    Unplug,
    /// Drop HPD, hold it low for the given time, then re-assert it.
    Bounce(Option<Duration>),
    /// Adjust how the simulated sink answers EDID reads.
    Edid(EdidCommand),
    /// Let the controller run for the given time before the next prompt.
    Wait(Duration),
    Status,
    History,
    Help(Option<&'a str>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdidCommand {
    /// Fail the next `n` reads or rechecks.
    Fail(u8),
    /// Present a different identity on the next read.
    Swap,
    /// Clear any scripted failures.
    Ok,
}

/// Top-level command keywords, used by `help` and error messages.
pub const COMMAND_KEYWORDS: [&str; 8] = [
    "plug", "unplug", "bounce", "edid", "wait", "status", "history", "help",
];

type Input<'src, 'slice> = &'slice [Token<'src>];

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let token = Token {
            kind: record.token,
            lexeme: &line[span.clone()],
            span,
        };
        push_token(&mut buffer, token)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(
            &mut buffer,
            Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            },
        )?;
    }

    Ok(buffer)
}

fn push_token<'a>(buffer: &mut TokenBuffer<'a>, token: Token<'a>) -> Result<(), LexError> {
    buffer.push(token).map_err(|_| LexError::TooManyTokens {
        processed: MAX_TOKENS + 1,
    })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a REPL command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::InvalidToken {
            span: token.span.clone(),
            lexeme: token.lexeme,
        }));
    }

    let mut input: Input<'_, '_> = tokens.as_slice();
    let command = command(&mut input).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = input.split_first() {
        if token.kind == TokenKind::Eol {
            input = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src>(input: &mut Input<'src, '_>) -> Result<Command<'src>, GrammarError<'src>> {
    let keyword = expect_kind(input, TokenKind::Ident, "command keyword")?;
    let lexeme = keyword.lexeme;

    if lexeme.eq_ignore_ascii_case("plug") {
        Ok(Command::Plug)
    } else if lexeme.eq_ignore_ascii_case("unplug") {
        Ok(Command::Unplug)
    } else if lexeme.eq_ignore_ascii_case("bounce") {
        let hold = optional_kind(input, TokenKind::Duration)
            .map(|token| duration_value(&token))
            .transpose()?;
        Ok(Command::Bounce(hold))
    } else if lexeme.eq_ignore_ascii_case("edid") {
        edid_command(input).map(Command::Edid)
    } else if lexeme.eq_ignore_ascii_case("wait") {
        let token = expect_kind(input, TokenKind::Duration, "duration")?;
        duration_value(&token).map(Command::Wait)
    } else if lexeme.eq_ignore_ascii_case("status") {
        Ok(Command::Status)
    } else if lexeme.eq_ignore_ascii_case("history") {
        Ok(Command::History)
    } else if lexeme.eq_ignore_ascii_case("help") {
        let topic = optional_kind(input, TokenKind::Ident).map(|token| token.lexeme);
        Ok(Command::Help(topic))
    } else {
        Err(GrammarError::UnknownCommand { lexeme })
    }
}

fn edid_command<'src>(input: &mut Input<'src, '_>) -> Result<EdidCommand, GrammarError<'src>> {
    let action = expect_kind(input, TokenKind::Ident, "fail, swap, or ok")?;
    if action.lexeme.eq_ignore_ascii_case("fail") {
        let count = expect_kind(input, TokenKind::Integer, "failure count")?;
        integer_value(&count).map(EdidCommand::Fail)
    } else if action.lexeme.eq_ignore_ascii_case("swap") {
        Ok(EdidCommand::Swap)
    } else if action.lexeme.eq_ignore_ascii_case("ok") {
        Ok(EdidCommand::Ok)
    } else {
        Err(GrammarError::unexpected("fail, swap, or ok", Some(&action)))
    }
}

fn expect_kind<'src>(
    input: &mut Input<'src, '_>,
    kind: TokenKind,
    label: &'static str,
) -> Result<Token<'src>, GrammarError<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(GrammarError::unexpected(label, other.map(|(token, _)| token))),
    }
}

fn optional_kind<'src>(input: &mut Input<'src, '_>, kind: TokenKind) -> Option<Token<'src>> {
    match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Some(token.clone())
        }
        _ => None,
    }
}

fn integer_value<'a>(token: &Token<'a>) -> Result<u8, GrammarError<'a>> {
    integer_literal
        .parse(token.lexeme)
        .map_err(|_| GrammarError::InvalidInteger {
            span: token.span.clone(),
        })
}

fn duration_value<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    duration_literal
        .parse(token.lexeme)
        .map_err(|_| GrammarError::InvalidDuration {
            span: token.span.clone(),
        })
}

fn integer_literal(input: &mut &str) -> Result<u8, ContextError> {
    digit1.parse_to().parse_next(input)
}

/// `<digits>ms` or `<digits>s`.
fn duration_literal(input: &mut &str) -> Result<Duration, ContextError> {
    let value: Result<u32, ContextError> = digit1.parse_to().parse_next(input);
    let unit: Result<u64, ContextError> =
        alt(("ms".value(1u64), "s".value(1_000u64))).parse_next(input);
    Ok(Duration::from_millis(u64::from(value?) * unit?))
}

/// Writes the help text for a topic, or the command overview when `topic` is `None`.
pub fn write_help<W: fmt::Write>(writer: &mut W, topic: Option<&str>) -> fmt::Result {
    const TOPICS: [(&str, &str); 8] = [
        ("plug", "plug                     - assert HPD and raise a hotplug event"),
        ("unplug", "unplug                   - de-assert HPD and raise a hotplug event"),
        ("bounce", "bounce [<duration>]      - drop HPD briefly, then re-assert it"),
        ("edid", "edid fail <n>|swap|ok    - script the sink's EDID answers"),
        ("wait", "wait <duration>          - let the controller run (e.g. 100ms, 2s)"),
        ("status", "status                   - display controller state and sink counters"),
        ("history", "history                  - list recent state machine evaluations"),
        ("help", "help [topic]             - show help for a command"),
    ];

    match topic {
        Some(target) => match TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target))
        {
            Some((_, detail)) => writer.write_str(detail),
            None => {
                write!(writer, "No help available for `{target}`. Available topics:")?;
                for keyword in COMMAND_KEYWORDS {
                    write!(writer, " {keyword}")?;
                }
                Ok(())
            }
        },
        None => {
            writer.write_str("Available commands:")?;
            for (_, detail) in TOPICS {
                write!(writer, "\n  {detail}")?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_line_level_commands() {
        assert_eq!(parse_ok("plug"), Command::Plug);
        assert_eq!(parse_ok("unplug\n"), Command::Unplug);
        assert_eq!(parse_ok("status"), Command::Status);
        assert_eq!(parse_ok("history"), Command::History);
    }

    #[test]
    fn parses_bounce_with_and_without_hold() {
        assert_eq!(parse_ok("bounce"), Command::Bounce(None));
        assert_eq!(
            parse_ok("bounce 250ms"),
            Command::Bounce(Some(Duration::from_millis(250)))
        );
    }

    #[test]
    fn parses_wait_seconds() {
        assert_eq!(parse_ok("wait 2s"), Command::Wait(Duration::from_secs(2)));
    }

    #[test]
    fn parses_edid_variants() {
        assert_eq!(parse_ok("edid fail 3"), Command::Edid(EdidCommand::Fail(3)));
        assert_eq!(parse_ok("edid swap"), Command::Edid(EdidCommand::Swap));
        assert_eq!(parse_ok("EDID OK"), Command::Edid(EdidCommand::Ok));
    }

    #[test]
    fn rejects_out_of_range_failure_count() {
        match parse("edid fail 300") {
            Err(ParseError::Grammar(GrammarError::InvalidInteger { .. })) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn wait_requires_a_duration() {
        match parse("wait") {
            Err(ParseError::Grammar(GrammarError::UnexpectedEnd { expected })) => {
                assert_eq!(expected, "duration");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_help_topic() {
        assert_eq!(parse_ok("help bounce"), Command::Help(Some("bounce")));
        assert_eq!(parse_ok("help"), Command::Help(None));
    }

    #[test]
    fn rejects_unknown_command() {
        assert_eq!(
            parse("replug"),
            Err(ParseError::Grammar(GrammarError::UnknownCommand {
                lexeme: "replug"
            }))
        );
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(matches!(
            parse("plug now"),
            Err(ParseError::Grammar(GrammarError::UnexpectedToken { .. }))
        ));
    }

    #[test]
    fn lexer_emits_error_token_for_unknown_symbol() {
        let tokens = lex("plug$").expect("lexing should succeed");
        let last = tokens.last().expect("expected at least one token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.lexeme, "$");
    }

    #[test]
    fn help_lists_every_command() {
        let mut text: heapless::String<1024> = heapless::String::new();
        write_help(&mut text, None).unwrap();
        for keyword in COMMAND_KEYWORDS {
            assert!(text.contains(keyword), "missing {keyword}");
        }
    }
}

//! Streaming lexers for Ion text, built on `nom`'s `streaming` combinators.
//!
//! Every parser in this module follows the same contract: `Err::Incomplete` means "the
//! token at the head of the input may extend beyond the buffered text"—the cursor responds
//! by buffering more text and re-running the parser—while `Err::Error` means the input does
//! not begin with the token in question. Parsers therefore never consume input on failure,
//! which is what makes the cursor's parse attempts free to retry.
//!
//! These lexers classify values and capture their lexemes; they do not build a value tree.

use nom::branch::alt;
use nom::bytes::streaming::{is_not, tag, take_until, take_while, take_while1, take_while_m_n};
use nom::character::streaming::{anychar, char, digit1, one_of, satisfy};
use nom::combinator::{map, map_opt, not, opt, peek, recognize, value, verify};
use nom::multi::{fold_many0, many0_count};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use crate::symbol::SymbolToken;
use crate::types::{IonType, SymbolId};

const WHITESPACE_CHARACTERS_AS_STR: &str = " \t\r\n\x0B\x0C";

/// How a symbol was written in the stream. The distinction matters in a few places: only
/// an *identifier* spelling of `$ion_1_0` is a version marker, and operators only exist
/// inside s-expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Identifier,
    Quoted,
    SymbolId,
    Operator,
}

/// A scalar recognized in the stream: its type, whether it was a (typed) null, its
/// content, and—for symbols—how it was written.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScalarToken {
    pub ion_type: IonType,
    pub is_null: bool,
    /// Decoded content for strings and text symbols; the raw lexeme for numeric types,
    /// timestamps, and lobs; empty for nulls.
    pub text: String,
    /// For symbol values: the token and its spelling.
    pub symbol: Option<(SymbolToken, SymbolKind)>,
}

impl ScalarToken {
    fn of(ion_type: IonType, text: impl Into<String>) -> ScalarToken {
        ScalarToken {
            ion_type,
            is_null: false,
            text: text.into(),
            symbol: None,
        }
    }

    fn null(ion_type: IonType) -> ScalarToken {
        ScalarToken {
            ion_type,
            is_null: true,
            text: String::new(),
            symbol: None,
        }
    }

    fn symbol(token: SymbolToken, kind: SymbolKind) -> ScalarToken {
        let text = token.text().unwrap_or("").to_string();
        ScalarToken {
            ion_type: IonType::Symbol,
            is_null: false,
            text,
            symbol: Some((token, kind)),
        }
    }
}

/// A value-position token: either a scalar or the opening delimiter of a container.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Scalar(ScalarToken),
    StructStart,
    ListStart,
    SExpStart,
}

/// A coarse token used when skipping over values without interpreting them. Strings,
/// comments, and lobs are lexed properly (their content can contain delimiter characters);
/// everything else is reduced to "opens a container", "closes a container", or "other".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawToken {
    Open,
    Close,
    Other,
}

// ===== Whitespace and comments =====

fn is_whitespace(c: char) -> bool {
    WHITESPACE_CHARACTERS_AS_STR.contains(c)
}

fn line_comment(input: &str) -> IResult<&str, ()> {
    value((), tuple((tag("//"), take_while(|c| c != '\n'), char('\n'))))(input)
}

fn block_comment(input: &str) -> IResult<&str, ()> {
    value((), tuple((tag("/*"), take_until("*/"), tag("*/"))))(input)
}

/// Matches any amount of whitespace and comments, including none. Reports `Incomplete` at
/// the end of the input, since more whitespace could follow.
pub(crate) fn whitespace_or_comments(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0_count(alt((
            value((), take_while1(is_whitespace)),
            line_comment,
            block_comment,
        ))),
    )(input)
}

/// Matches (but does not consume) the next character in the input if it is one of the Ion
/// stop characters. These characters must follow several different Ion text encodings,
/// including integers, floats, decimals, and timestamps.
fn stop_character(input: &str) -> IResult<&str, char> {
    peek(one_of("{}[](),\"' \t\n\r\u{0b}\u{0c}"))(input)
}

fn is_operator_character(c: char) -> bool {
    "!#%&*+-./;<=>?@^`|~".contains(c)
}

// Numbers inside an s-expression may be terminated by an operator as well as by a stop
// character: `(1+1)` is the int 1, the operator `+`, and the int 1.
fn numeric_stop(input: &str, in_sexp: bool) -> IResult<&str, ()> {
    if in_sexp {
        value((), peek(satisfy(|c| is_operator_character(c))))(input)
            .or_else(|_: nom::Err<nom::error::Error<&str>>| value((), stop_character)(input))
    } else {
        value((), stop_character)(input)
    }
}

// ===== Symbols =====

fn identifier_initial_character(input: &str) -> IResult<&str, char> {
    alt((one_of("$_"), satisfy(|c| c.is_ascii_alphabetic())))(input)
}

fn identifier_trailing_character(input: &str) -> IResult<&str, char> {
    alt((one_of("$_"), satisfy(|c| c.is_ascii_alphanumeric())))(input)
}

/// Matches an identifier (e.g. `foo`). Ion defines a number of keywords that are
/// syntactically indistinguishable from identifiers; keywords take precedence, so any
/// identifier we find must be verified not to be one.
pub(crate) fn identifier(input: &str) -> IResult<&str, &str> {
    map_opt(
        recognize(terminated(
            pair(
                identifier_initial_character,
                many0_count(identifier_trailing_character),
            ),
            not(identifier_trailing_character),
        )),
        |text: &str| {
            const KEYWORDS: &[&str] = &["true", "false", "nan", "null"];
            if KEYWORDS.contains(&text) {
                return None;
            }
            Some(text)
        },
    )(input)
}

/// Matches a symbol ID literal like `$10`.
fn symbol_id(input: &str) -> IResult<&str, SymbolId> {
    map_opt(
        terminated(
            preceded(char('$'), digit1),
            not(identifier_trailing_character),
        ),
        |digits: &str| digits.parse::<SymbolId>().ok(),
    )(input)
}

fn quoted_symbol(input: &str) -> IResult<&str, String> {
    delimited(char('\''), quoted_symbol_body, char('\''))(input)
}

fn quoted_symbol_body(input: &str) -> IResult<&str, String> {
    fold_many0(
        alt((
            escaped_newline,
            map(escaped_char, StringFragment::EscapedChar),
            map(
                verify(is_not("'\\\r\n"), |s: &str| !s.is_empty()),
                StringFragment::Substring,
            ),
        )),
        String::new,
        fold_fragment,
    )(input)
}

/// Matches any spelling of a symbol that can appear as an annotation or a field name.
pub(crate) fn symbol_text_token(input: &str) -> IResult<&str, (SymbolToken, SymbolKind)> {
    alt((
        map(symbol_id, |sid| {
            (SymbolToken::from_sid(sid), SymbolKind::SymbolId)
        }),
        map(identifier, |text| {
            (SymbolToken::from_text(text), SymbolKind::Identifier)
        }),
        map(quoted_symbol, |text| {
            (SymbolToken::from_text(text), SymbolKind::Quoted)
        }),
    ))(input)
}

/// Matches an operator symbol (e.g. `+` or `==`). This syntax is only recognized inside an
/// s-expression.
fn operator(input: &str) -> IResult<&str, &str> {
    take_while1(is_operator_character)(input)
}

// ===== Annotations and field names =====

/// Matches one annotation: a symbol followed by `::` (whitespace and comments permitted
/// in between).
pub(crate) fn annotation(input: &str) -> IResult<&str, (SymbolToken, SymbolKind)> {
    terminated(
        symbol_text_token,
        tuple((whitespace_or_comments, tag("::"))),
    )(input)
}

/// Matches a struct field name: a symbol or string followed by a single `:`.
pub(crate) fn field_name(input: &str) -> IResult<&str, SymbolToken> {
    terminated(
        alt((
            map(symbol_text_token, |(token, _kind)| token),
            map(short_string, SymbolToken::from_text),
            map(|i| long_string(i, false), SymbolToken::from_text),
        )),
        tuple((whitespace_or_comments, char(':'), not(char(':')))),
    )(input)
}

// ===== Strings =====

#[derive(Clone)]
enum StringFragment<'a> {
    Substring(&'a str),
    EscapedChar(char),
    EscapedNewline,
}

fn fold_fragment(mut string: String, fragment: StringFragment<'_>) -> String {
    match fragment {
        StringFragment::EscapedNewline => {} // Discard escaped newlines
        StringFragment::EscapedChar(c) => string.push(c),
        StringFragment::Substring(s) => string.push_str(s),
    }
    string
}

fn escaped_newline(input: &str) -> IResult<&str, StringFragment<'_>> {
    value(
        StringFragment::EscapedNewline,
        alt((tag("\\\r\n"), tag("\\\n"), tag("\\\r"))),
    )(input)
}

fn escaped_char(input: &str) -> IResult<&str, char> {
    preceded(
        char('\\'),
        alt((
            hex_escape("x", 2),
            hex_escape("u", 4),
            hex_escape("U", 8),
            map_opt(anychar, |c| match c {
                'n' => Some('\n'),
                't' => Some('\t'),
                'r' => Some('\r'),
                '0' => Some('\0'),
                'a' => Some('\x07'),
                'b' => Some('\x08'),
                'f' => Some('\x0C'),
                'v' => Some('\x0B'),
                '\\' => Some('\\'),
                '"' => Some('"'),
                '\'' => Some('\''),
                '/' => Some('/'),
                '?' => Some('?'),
                _ => None,
            }),
        )),
    )(input)
}

fn hex_escape(marker: &'static str, digits: usize) -> impl Fn(&str) -> IResult<&str, char> {
    move |input: &str| {
        map_opt(
            preceded(
                tag(marker),
                take_while_m_n(digits, digits, |c: char| c.is_ascii_hexdigit()),
            ),
            |hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32),
        )(input)
    }
}

/// Matches a short string (`"..."`) and returns its unescaped content.
pub(crate) fn short_string(input: &str) -> IResult<&str, String> {
    delimited(char('"'), short_string_body, char('"'))(input)
}

fn short_string_body(input: &str) -> IResult<&str, String> {
    fold_many0(
        alt((
            escaped_newline,
            map(escaped_char, StringFragment::EscapedChar),
            map(
                verify(is_not("\"\\"), |s: &str| !s.is_empty()),
                StringFragment::Substring,
            ),
        )),
        String::new,
        fold_fragment,
    )(input)
}

// Matches the body of one long-string segment, processing escapes until the closing `'''`.
fn long_string_segment(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = tag("'''")(input)?;
    let mut content = String::new();
    loop {
        if let Ok((after, _)) = tag::<_, _, nom::error::Error<&str>>("'''")(rest) {
            return Ok((after, content));
        }
        if rest.starts_with('\\') {
            let (after, fragment) =
                alt((escaped_newline, map(escaped_char, StringFragment::EscapedChar)))(rest)?;
            content = fold_fragment(content, fragment);
            rest = after;
            continue;
        }
        let mut characters = rest.chars();
        match characters.next() {
            Some(c) => {
                content.push(c);
                rest = characters.as_str();
            }
            None => return Err(nom::Err::Incomplete(nom::Needed::Unknown)),
        }
    }
}

/// Matches one or more adjacent long-string segments (`'''…''' '''…'''`) and returns their
/// concatenated content.
///
/// Whether another segment follows the current one can only be decided by reading past it,
/// so the probe for a continuation reports `Incomplete` when it reaches the end of the
/// buffered text. Once the caller knows the stream has ended (`at_eof`), no continuation
/// can arrive and the probe's `Incomplete` means the string is finished; an `Incomplete`
/// from inside a segment still means the string was truncated.
pub(crate) fn long_string(input: &str, at_eof: bool) -> IResult<&str, String> {
    let (mut rest, mut content) = long_string_segment(input)?;
    loop {
        match preceded(whitespace_or_comments, long_string_segment)(rest) {
            Ok((after, more)) => {
                content.push_str(&more);
                rest = after;
            }
            Err(nom::Err::Incomplete(_)) if at_eof => return Ok((rest, content)),
            Err(nom::Err::Incomplete(needed)) => return Err(nom::Err::Incomplete(needed)),
            Err(_) => return Ok((rest, content)),
        }
    }
}

// ===== Numbers =====

fn is_digit_or_underscore(c: char) -> bool {
    c.is_ascii_digit() || c == '_'
}

fn number_lexeme(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(char('-')),
        take_while1(is_digit_or_underscore),
        opt(pair(char('.'), take_while(is_digit_or_underscore))),
        opt(tuple((
            one_of("eEdD"),
            opt(one_of("+-")),
            take_while1(is_digit_or_underscore),
        ))),
    )))(input)
}

fn radix_int_lexeme(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(char('-')),
        alt((tag("0x"), tag("0X"), tag("0b"), tag("0B"))),
        take_while1(|c: char| c.is_ascii_hexdigit() || c == '_'),
    )))(input)
}

// Classifies a matched numeric lexeme: an exponent written with `e` makes it a float; a
// `d` exponent or a decimal point makes it a decimal; otherwise it is an int.
fn classify_number(lexeme: &str) -> ScalarToken {
    let ion_type = if lexeme.contains(['e', 'E']) {
        IonType::Float
    } else if lexeme.contains(['d', 'D', '.']) {
        IonType::Decimal
    } else {
        IonType::Int
    };
    ScalarToken::of(ion_type, lexeme)
}

// ===== Nulls, booleans, special floats =====

fn ion_type_name(input: &str) -> IResult<&str, IonType> {
    terminated(
        alt((
            value(IonType::Null, tag("null")),
            value(IonType::Bool, tag("bool")),
            value(IonType::Int, tag("int")),
            value(IonType::Float, tag("float")),
            value(IonType::Decimal, tag("decimal")),
            value(IonType::Timestamp, tag("timestamp")),
            value(IonType::Symbol, tag("symbol")),
            value(IonType::String, tag("string")),
            value(IonType::Clob, tag("clob")),
            value(IonType::Blob, tag("blob")),
            value(IonType::List, tag("list")),
            value(IonType::SExp, tag("sexp")),
            value(IonType::Struct, tag("struct")),
        )),
        not(identifier_trailing_character),
    )(input)
}

fn null_value(input: &str) -> IResult<&str, ScalarToken> {
    let (rest, _) = terminated(tag("null"), not(identifier_trailing_character))(input)?;
    let (rest, ion_type) = opt(preceded(char('.'), ion_type_name))(rest)?;
    Ok((rest, ScalarToken::null(ion_type.unwrap_or(IonType::Null))))
}

fn boolean(input: &str) -> IResult<&str, ScalarToken> {
    map(
        terminated(
            alt((tag("true"), tag("false"))),
            not(identifier_trailing_character),
        ),
        |lexeme: &str| ScalarToken::of(IonType::Bool, lexeme),
    )(input)
}

fn special_float(input: &str) -> IResult<&str, ScalarToken> {
    map(
        alt((
            terminated(tag("nan"), not(identifier_trailing_character)),
            terminated(
                recognize(pair(one_of("+-"), tag("inf"))),
                not(identifier_trailing_character),
            ),
        )),
        |lexeme: &str| ScalarToken::of(IonType::Float, lexeme),
    )(input)
}

// ===== Timestamps =====

fn digits(count: usize) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input: &str| take_while_m_n(count, count, |c: char| c.is_ascii_digit())(input)
}

fn timestamp_offset(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(char('Z')),
        recognize(tuple((one_of("+-"), digits(2), char(':'), digits(2)))),
    ))(input)
}

fn timestamp_time(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        digits(2),
        char(':'),
        digits(2),
        opt(tuple((
            char(':'),
            digits(2),
            opt(pair(char('.'), digit1)),
        ))),
        timestamp_offset,
    )))(input)
}

/// Matches the lexeme of a timestamp: `2021T`, `2021-02T`, `2021-02-08`,
/// `2021-02-08T12:30Z`, `2021-02-08T12:30:02.111-00:00`, and so on. Recognition is
/// lexical; calendar validation belongs to value materialization, which is out of scope
/// for the cursor.
fn timestamp_lexeme(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        digits(4),
        alt((
            recognize(char('T')),
            recognize(tuple((
                char('-'),
                digits(2),
                alt((
                    recognize(tuple((
                        char('-'),
                        digits(2),
                        opt(pair(char('T'), opt(timestamp_time))),
                    ))),
                    recognize(char('T')),
                )),
            ))),
        )),
    ))(input)
}

// ===== Lobs =====

fn is_base64_character(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+/=".contains(c) || is_whitespace(c)
}

/// Matches a blob or clob (`{{ ... }}`) and returns its content as a lexeme. Clob content
/// is a (long) string; blob content is base64 text. Neither is decoded here.
fn lob(input: &str) -> IResult<&str, ScalarToken> {
    delimited(
        pair(tag("{{"), take_while(is_whitespace)),
        alt((
            map(short_string, |text| ScalarToken::of(IonType::Clob, text)),
            map(
                |i| long_string(i, false),
                |text| ScalarToken::of(IonType::Clob, text),
            ),
            map(take_while(is_base64_character), |lexeme: &str| {
                ScalarToken::of(IonType::Blob, lexeme.trim())
            }),
        )),
        pair(take_while(is_whitespace), tag("}}")),
    )(input)
}

// ===== Value dispatch =====

/// Matches the next value-position token: a scalar or a container opener. Closing
/// delimiters and separators are context-sensitive and handled by the cursor directly.
/// `at_eof` declares that no text will ever follow `input`; it resolves the tokens whose
/// ends are otherwise ambiguous (see [long_string]).
pub(crate) fn value_token(input: &str, in_sexp: bool, at_eof: bool) -> IResult<&str, Token> {
    // Two-character tokens ({{) must be tried before their one-character prefixes. A lone
    // `{` at the end of the input reports Incomplete: it could still grow into `{{`.
    match lob(input) {
        Ok((rest, scalar)) => return Ok((rest, Token::Scalar(scalar))),
        Err(nom::Err::Incomplete(needed)) => return Err(nom::Err::Incomplete(needed)),
        Err(_) => {}
    }
    if let Ok((rest, token)) = alt::<_, _, nom::error::Error<&str>, _>((
        value(Token::StructStart, char('{')),
        value(Token::ListStart, char('[')),
        value(Token::SExpStart, char('(')),
    ))(input)
    {
        return Ok((rest, token));
    }
    let scalar_result = alt((
        null_value,
        boolean,
        special_float,
        map(terminated(timestamp_lexeme, stop_character), |lexeme| {
            ScalarToken::of(IonType::Timestamp, lexeme)
        }),
        |i| {
            map(radix_int_lexeme, |lexeme| {
                ScalarToken::of(IonType::Int, lexeme)
            })(i)
            .and_then(|(rest, token)| numeric_stop(rest, in_sexp).map(|_| (rest, token)))
        },
        |i| {
            map(number_lexeme, classify_number)(i)
                .and_then(|(rest, token)| numeric_stop(rest, in_sexp).map(|_| (rest, token)))
        },
        map(short_string, |text| ScalarToken::of(IonType::String, text)),
        map(
            |i| long_string(i, at_eof),
            |text| ScalarToken::of(IonType::String, text),
        ),
        map(symbol_text_token, |(token, kind)| {
            ScalarToken::symbol(token, kind)
        }),
    ))(input);
    match scalar_result {
        Ok((rest, scalar)) => Ok((rest, Token::Scalar(scalar))),
        Err(nom::Err::Incomplete(needed)) => Err(nom::Err::Incomplete(needed)),
        Err(error) => {
            if in_sexp {
                if let Ok((rest, lexeme)) = operator(input) {
                    let token = SymbolToken::from_text(lexeme);
                    return Ok((
                        rest,
                        Token::Scalar(ScalarToken::symbol(token, SymbolKind::Operator)),
                    ));
                }
            }
            Err(error)
        }
    }
}

/// Matches the next token at a coarse granularity, for skipping over unread values.
pub(crate) fn raw_token(input: &str) -> IResult<&str, RawToken> {
    preceded(
        whitespace_or_comments,
        alt((
            // `alt` short-circuits on Incomplete, so a lone `{` (which could grow into
            // `{{`) is reported as Incomplete by the lob parser before the opener branch
            // can misread it.
            map(lob, |_| RawToken::Other),
            value(RawToken::Open, one_of("{[(")),
            value(RawToken::Close, one_of("}])")),
            map(|i| long_string(i, false), |_| RawToken::Other),
            map(short_string, |_| RawToken::Other),
            map(quoted_symbol, |_| RawToken::Other),
            value(
                RawToken::Other,
                take_while1(|c: char| !"{}[]()\"'/".contains(c) && !is_whitespace(c)),
            ),
            value(RawToken::Other, char('/')),
        )),
    )(input)
}

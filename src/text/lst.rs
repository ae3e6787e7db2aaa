//! Parsing of `$ion_symbol_table::{...}` structs encountered in a text stream.
//!
//! The cursor re-runs this parser from the struct's opening brace each time more text
//! arrives; nothing is consumed until the entire declaration has been recognized, which is
//! what makes the operation resumable. `Incomplete` surfaces as `Ok(None)` ("buffer more
//! and retry"); any other parse failure means the declaration is structurally invalid.

use nom::character::streaming::char;
use nom::error::{Error, ErrorKind};
use nom::IResult;

use crate::result::{decoding_error, IonResult};
use crate::symtab::imports::{ImportDescriptor, LstDeclaration};
use crate::text::lexer::{
    field_name, raw_token, symbol_text_token, value_token, whitespace_or_comments, RawToken,
    ScalarToken, Token,
};
use crate::types::IonType;

/// Attempts to parse a complete symbol table struct from the head of `text` (which must
/// begin at the struct's `{`). Returns `Ok(Some((consumed, declaration)))` on success,
/// `Ok(None)` if the struct extends beyond the available text, and a decoding fault if the
/// declaration is malformed.
pub(crate) fn parse_local_symbol_table_text(
    text: &str,
) -> IonResult<Option<(usize, LstDeclaration)>> {
    match lst_struct(text) {
        Ok((rest, declaration)) => Ok(Some((text.len() - rest.len(), declaration))),
        Err(nom::Err::Incomplete(_)) => Ok(None),
        Err(_) => decoding_error("encountered a structurally invalid symbol table declaration"),
    }
}

fn failure<T>(input: &str) -> IResult<&str, T> {
    Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify)))
}

fn lst_struct(input: &str) -> IResult<&str, LstDeclaration> {
    let (mut rest, _) = char('{')(input)?;
    let mut declaration = LstDeclaration::default();
    let mut has_found_imports = false;
    let mut has_found_symbols = false;
    let mut expect_separator = false;

    loop {
        let (r, _) = whitespace_or_comments(rest)?;
        if let Ok((r, _)) = char::<_, Error<&str>>('}')(r) {
            return Ok((r, declaration));
        }
        if expect_separator {
            let (r2, _) = char(',')(r)?;
            rest = r2;
            expect_separator = false;
            continue;
        }
        let (r, key) = field_name(r)?;
        let (r, _) = whitespace_or_comments(r)?;
        let is_imports = key.text() == Some("imports") || key.sid() == Some(6);
        let is_symbols = key.text() == Some("symbols") || key.sid() == Some(7);
        let r = if is_imports {
            if has_found_imports {
                return failure(r);
            }
            has_found_imports = true;
            imports_field(r, &mut declaration)?.0
        } else if is_symbols {
            if has_found_symbols {
                return failure(r);
            }
            has_found_symbols = true;
            symbols_field(r, &mut declaration)?.0
        } else {
            skip_value(r)?.0
        };
        rest = r;
        expect_separator = true;
    }
}

// The `imports` field: the symbol `$ion_symbol_table` (append mode), a list of import
// structs, or open content.
fn imports_field<'a>(
    input: &'a str,
    declaration: &mut LstDeclaration,
) -> IResult<&'a str, ()> {
    if let Ok((rest, (token, _kind))) = symbol_text_token(input) {
        declaration.is_append = token.text() == Some("$ion_symbol_table") || token.sid() == Some(3);
        return Ok((rest, ()));
    }
    if let Ok((mut rest, _)) = char::<_, Error<&str>>('[')(input) {
        let mut expect_separator = false;
        loop {
            let (r, _) = whitespace_or_comments(rest)?;
            if let Ok((r, _)) = char::<_, Error<&str>>(']')(r) {
                return Ok((r, ()));
            }
            if expect_separator {
                let (r2, _) = char(',')(r)?;
                rest = r2;
                expect_separator = false;
                continue;
            }
            let r = if let Ok((r, _)) = char::<_, Error<&str>>('{')(r) {
                let (r, descriptor) = import_struct(r)?;
                if let Some(descriptor) = descriptor {
                    declaration.imports.push(descriptor);
                }
                r
            } else {
                skip_value(r)?.0
            };
            rest = r;
            expect_separator = true;
        }
    }
    skip_value(input)
}

// One `{ name: ..., version: ..., max_id: ... }` import struct; the opening brace has
// already been consumed.
fn import_struct(input: &str) -> IResult<&str, Option<ImportDescriptor>> {
    let mut name: Option<String> = None;
    let mut version: usize = 1;
    let mut max_id: Option<usize> = None;
    let mut rest = input;
    let mut expect_separator = false;

    loop {
        let (r, _) = whitespace_or_comments(rest)?;
        if let Ok((r, _)) = char::<_, Error<&str>>('}')(r) {
            let descriptor = match name {
                Some(name) if !name.is_empty() && name != "$ion" => Some(ImportDescriptor {
                    name,
                    version,
                    max_id,
                }),
                _ => None,
            };
            return Ok((r, descriptor));
        }
        if expect_separator {
            let (r2, _) = char(',')(r)?;
            rest = r2;
            expect_separator = false;
            continue;
        }
        let (r, key) = field_name(r)?;
        let (r, _) = whitespace_or_comments(r)?;
        let (r, scalar) = scalar_value(r)?;
        match () {
            _ if key.text() == Some("name") || key.sid() == Some(4) => {
                if scalar.ion_type == IonType::String && !scalar.is_null {
                    name = Some(scalar.text);
                }
            }
            _ if key.text() == Some("version") || key.sid() == Some(5) => {
                if let Some(value) = parse_int_lexeme(&scalar) {
                    version = value.max(1);
                }
            }
            _ if key.text() == Some("max_id") || key.sid() == Some(8) => {
                max_id = parse_int_lexeme(&scalar);
            }
            _ => {}
        }
        rest = r;
        expect_separator = true;
    }
}

// The `symbols` field: a list in which every element occupies one symbol ID slot; elements
// that are not non-null strings become placeholder slots with unknown text.
fn symbols_field<'a>(
    input: &'a str,
    declaration: &mut LstDeclaration,
) -> IResult<&'a str, ()> {
    let Ok((mut rest, _)) = char::<_, Error<&str>>('[')(input) else {
        return skip_value(input);
    };
    let mut expect_separator = false;
    loop {
        let (r, _) = whitespace_or_comments(rest)?;
        if let Ok((r, _)) = char::<_, Error<&str>>(']')(r) {
            return Ok((r, ()));
        }
        if expect_separator {
            let (r2, _) = char(',')(r)?;
            rest = r2;
            expect_separator = false;
            continue;
        }
        match value_token(r, false, false) {
            Ok((r, Token::Scalar(scalar)))
                if scalar.ion_type == IonType::String && !scalar.is_null =>
            {
                declaration.symbols.push(Some(scalar.text));
                rest = r;
            }
            Ok((r, Token::Scalar(_))) => {
                declaration.symbols.push(None);
                rest = r;
            }
            Ok(_) => {
                // A container element; skip it in full.
                declaration.symbols.push(None);
                rest = skip_value(r)?.0;
            }
            Err(nom::Err::Incomplete(needed)) => return Err(nom::Err::Incomplete(needed)),
            Err(error) => return Err(error),
        }
        expect_separator = true;
    }
}

fn scalar_value(input: &str) -> IResult<&str, ScalarToken> {
    match value_token(input, false, false) {
        Ok((rest, Token::Scalar(scalar))) => Ok((rest, scalar)),
        Ok(_) => {
            // A container where a scalar was expected; skip it and treat it as no value.
            let (rest, _) = skip_value(input)?;
            Ok((rest, ScalarToken {
                ion_type: IonType::Null,
                is_null: true,
                text: String::new(),
                symbol: None,
            }))
        }
        Err(error) => Err(error),
    }
}

fn parse_int_lexeme(scalar: &ScalarToken) -> Option<usize> {
    if scalar.ion_type != IonType::Int || scalar.is_null {
        return None;
    }
    let digits: String = scalar.text.chars().filter(|c| *c != '_').collect();
    digits.parse::<usize>().ok()
}

// Steps over one complete value of any type, using the coarse raw-token lexer to balance
// container delimiters.
fn skip_value(input: &str) -> IResult<&str, ()> {
    let (mut rest, token) = raw_token(input)?;
    match token {
        RawToken::Other => Ok((rest, ())),
        RawToken::Close => failure(input),
        RawToken::Open => {
            let mut depth = 1usize;
            while depth > 0 {
                let (r, token) = raw_token(rest)?;
                rest = r;
                match token {
                    RawToken::Open => depth += 1,
                    RawToken::Close => depth -= 1,
                    RawToken::Other => {}
                }
            }
            Ok((rest, ()))
        }
    }
}

#[cfg(test)]
mod text_lst_tests {
    use super::*;

    fn parse(text: &str) -> IonResult<Option<(usize, LstDeclaration)>> {
        parse_local_symbol_table_text(text)
    }

    #[test]
    fn symbols_list() -> IonResult<()> {
        let (consumed, declaration) = parse("{symbols: [\"hi\", \"there\"]} 5")?.unwrap();
        assert_eq!(consumed, "{symbols: [\"hi\", \"there\"]}".len());
        assert!(!declaration.is_append);
        assert_eq!(
            declaration.symbols,
            vec![Some("hi".to_string()), Some("there".to_string())]
        );
        Ok(())
    }

    #[test]
    fn non_string_symbols_become_placeholders() -> IonResult<()> {
        let (_consumed, declaration) = parse("{symbols: [null, 5, \"ok\"]} ")?.unwrap();
        assert_eq!(
            declaration.symbols,
            vec![None, None, Some("ok".to_string())]
        );
        Ok(())
    }

    #[test]
    fn append_mode() -> IonResult<()> {
        let (_consumed, declaration) =
            parse("{imports: $ion_symbol_table, symbols: [\"x\"]} ")?.unwrap();
        assert!(declaration.is_append);
        assert_eq!(declaration.symbols.len(), 1);
        Ok(())
    }

    #[test]
    fn import_list() -> IonResult<()> {
        let text = "{imports: [{name: \"T\", version: 2, max_id: 3}]} ";
        let (_consumed, declaration) = parse(text)?.unwrap();
        assert_eq!(
            declaration.imports,
            vec![ImportDescriptor {
                name: "T".to_string(),
                version: 2,
                max_id: Some(3),
            }]
        );
        Ok(())
    }

    #[test]
    fn incomplete_struct_asks_for_more_data() -> IonResult<()> {
        assert!(parse("{symbols: [\"hi\"")?.is_none());
        assert!(parse("{")?.is_none());
        Ok(())
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        assert!(parse("{symbols: [], symbols: []} ").is_err());
    }

    #[test]
    fn open_content_is_ignored() -> IonResult<()> {
        let text = "{other: {nested: [1, 2]}, symbols: [\"a\"], flag: true} ";
        let (_consumed, declaration) = parse(text)?.unwrap();
        assert_eq!(declaration.symbols, vec![Some("a".to_string())]);
        Ok(())
    }
}

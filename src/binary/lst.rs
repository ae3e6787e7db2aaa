//! Parsing of `$ion_symbol_table`-annotated structs encountered in a binary stream.
//!
//! The cursor materializes a symbol table struct in full before interpreting it, so the
//! functions here operate on a bounded [`BinaryBuffer`] view and never see incomplete data.
//! Field order in the stream is unconstrained—`symbols` may precede `imports`—but imports
//! must take effect first, so parsing collects a declaration that the cursor applies in the
//! correct order afterwards.

use crate::binary::buffer::BinaryBuffer;
use crate::binary::type_descriptor::TypeDescriptor;
use crate::constants::v1_0::system_symbol_ids;
use crate::result::{decoding_error, incomplete_data_error, IonResult};
use crate::symtab::imports::{ImportDescriptor, LstDeclaration};
use crate::types::IonType;

/// Parses the body of a symbol table struct into an [LstDeclaration].
pub(crate) fn parse_local_symbol_table(
    mut body: BinaryBuffer<&[u8]>,
) -> IonResult<LstDeclaration> {
    let mut declaration = LstDeclaration::default();
    let mut has_found_imports = false;
    let mut has_found_symbols = false;

    while !body.is_empty() {
        let field_id = body.read_var_uint()?.value();
        let type_descriptor = body.peek_type_descriptor()?;
        if type_descriptor.is_nop() {
            body.read_nop_pad()?;
            continue;
        }
        match field_id {
            system_symbol_ids::IMPORTS => {
                if has_found_imports {
                    return decoding_error("symbol table had multiple `imports` fields");
                }
                has_found_imports = true;
                read_imports_field(&mut body, type_descriptor, &mut declaration)?;
            }
            system_symbol_ids::SYMBOLS => {
                if has_found_symbols {
                    return decoding_error("symbol table had multiple `symbols` fields");
                }
                has_found_symbols = true;
                read_symbols_field(&mut body, type_descriptor, &mut declaration)?;
            }
            // Open content; values in unrecognized fields are ignored.
            _ => skip_value(&mut body)?,
        }
    }
    Ok(declaration)
}

// The `imports` field is either the symbol `$ion_symbol_table` (append mode) or a list of
// import structs. Any other value leaves the declaration in its default, fresh-table mode.
fn read_imports_field(
    body: &mut BinaryBuffer<&[u8]>,
    type_descriptor: TypeDescriptor,
    declaration: &mut LstDeclaration,
) -> IonResult<()> {
    match type_descriptor.ion_type {
        Some(IonType::Symbol) if !type_descriptor.is_null() => {
            let length = consume_header(body, type_descriptor)?;
            let sid = read_uint_value(body, length)?;
            declaration.is_append = sid == system_symbol_ids::ION_SYMBOL_TABLE as u64;
            Ok(())
        }
        Some(IonType::List) if !type_descriptor.is_null() => {
            let length = consume_header(body, type_descriptor)?;
            let mut list = body.take_sub_buffer(length)?;
            while !list.is_empty() {
                let element = list.peek_type_descriptor()?;
                if element.is_nop() {
                    list.read_nop_pad()?;
                    continue;
                }
                if element.ion_type != Some(IonType::Struct) || element.is_null() {
                    // Not an import struct; ignore it.
                    skip_value(&mut list)?;
                    continue;
                }
                let struct_length = consume_header(&mut list, element)?;
                let import_struct = list.take_sub_buffer(struct_length)?;
                if let Some(descriptor) = parse_import_struct(import_struct)? {
                    declaration.imports.push(descriptor);
                }
            }
            Ok(())
        }
        _ => skip_value(body),
    }
}

// An import struct: { name: string, version: int, max_id: int }. Imports with no usable
// name—and imports naming the system table, which is always implicitly present—are ignored.
fn parse_import_struct(
    mut body: BinaryBuffer<&[u8]>,
) -> IonResult<Option<ImportDescriptor>> {
    let mut name: Option<String> = None;
    let mut version: usize = 1;
    let mut max_id: Option<usize> = None;

    while !body.is_empty() {
        let field_id = body.read_var_uint()?.value();
        let type_descriptor = body.peek_type_descriptor()?;
        if type_descriptor.is_nop() {
            body.read_nop_pad()?;
            continue;
        }
        match (field_id, type_descriptor.ion_type) {
            (system_symbol_ids::NAME, Some(IonType::String)) if !type_descriptor.is_null() => {
                let length = consume_header(&mut body, type_descriptor)?;
                name = Some(read_string_value(&mut body, length)?);
            }
            (system_symbol_ids::VERSION, Some(IonType::Int)) if !type_descriptor.is_null() => {
                let length = consume_header(&mut body, type_descriptor)?;
                version = (read_uint_value(&mut body, length)? as usize).max(1);
            }
            (system_symbol_ids::MAX_ID, Some(IonType::Int)) if !type_descriptor.is_null() => {
                let length = consume_header(&mut body, type_descriptor)?;
                max_id = Some(read_uint_value(&mut body, length)? as usize);
            }
            _ => skip_value(&mut body)?,
        }
    }
    match name {
        Some(name) if !name.is_empty() && name != "$ion" => Ok(Some(ImportDescriptor {
            name,
            version,
            max_id,
        })),
        _ => Ok(None),
    }
}

// The `symbols` field must be a list; every element occupies a symbol ID slot. Elements
// that are not non-null strings produce placeholder slots with unknown text.
fn read_symbols_field(
    body: &mut BinaryBuffer<&[u8]>,
    type_descriptor: TypeDescriptor,
    declaration: &mut LstDeclaration,
) -> IonResult<()> {
    match type_descriptor.ion_type {
        Some(IonType::List) if !type_descriptor.is_null() => {
            let length = consume_header(body, type_descriptor)?;
            let mut list = body.take_sub_buffer(length)?;
            while !list.is_empty() {
                let element = list.peek_type_descriptor()?;
                if element.is_nop() {
                    list.read_nop_pad()?;
                    continue;
                }
                if element.ion_type == Some(IonType::String) && !element.is_null() {
                    let length = consume_header(&mut list, element)?;
                    let text = read_string_value(&mut list, length)?;
                    declaration.symbols.push(Some(text));
                } else {
                    skip_value(&mut list)?;
                    declaration.symbols.push(None);
                }
            }
            Ok(())
        }
        _ => skip_value(body),
    }
}

// Consumes a value's type descriptor byte and any length bytes, returning the length of
// the value's body.
fn consume_header(
    body: &mut BinaryBuffer<&[u8]>,
    type_descriptor: TypeDescriptor,
) -> IonResult<usize> {
    let header = type_descriptor
        .to_header()
        .ok_or_else(|| crate::result::decoding_error_raw("found a non-value in value position"))?;
    body.consume(1);
    let length = body.read_value_length(header)?;
    Ok(length.value())
}

// Steps over a complete value (annotated or not) without interpreting it.
fn skip_value(body: &mut BinaryBuffer<&[u8]>) -> IonResult<()> {
    let type_descriptor = body.peek_type_descriptor()?;
    if type_descriptor.is_annotation_wrapper() {
        body.consume(1);
        let length = body.read_length(type_descriptor.length_code)?;
        if body.remaining() < length.value() {
            return incomplete_data_error("an annotated value", body.total_consumed());
        }
        body.consume(length.value());
        return Ok(());
    }
    let length = consume_header(body, type_descriptor)?;
    if body.remaining() < length {
        return incomplete_data_error("a value", body.total_consumed());
    }
    body.consume(length);
    Ok(())
}

fn read_string_value(body: &mut BinaryBuffer<&[u8]>, length: usize) -> IonResult<String> {
    let bytes = body
        .peek_n_bytes(length)
        .ok_or_else(|| crate::result::incomplete_data_error_raw("a string", body.total_consumed()))?;
    let text = std::str::from_utf8(bytes)
        .map_err(|_| crate::result::decoding_error_raw("encountered a string with invalid utf-8 data"))?
        .to_string();
    body.consume(length);
    Ok(text)
}

fn read_uint_value(body: &mut BinaryBuffer<&[u8]>, length: usize) -> IonResult<u64> {
    let magnitude = body.read_uint(length)?;
    magnitude
        .value()
        .as_u64()
        .ok_or_else(|| crate::result::decoding_error_raw("found a uint too large for its context"))
}

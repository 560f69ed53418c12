//! Canonical JSON — fixed key ordering, UTF-8 encoding, and deterministic
//! numeric formatting for ledger hashing (spec §4.6).
//!
//! Grounded in architecture on the teacher's `physics/canonical_json.rs`
//! (an explicit, depth- and size-bounded emitter over a parsed value tree),
//! but built on top of `serde_json::Value` rather than a hand-rolled parser:
//! this spec's ledger entries carry ordinary JSON numbers (full-precision
//! floats, unquoted integers — spec §4.6), which is exactly what
//! `serde_json` already parses correctly; re-deriving JSON number grammar by
//! hand would not be idiomatic when the crate most of the example pack
//! already depends on does it for us. What remains bespoke, as in the
//! teacher, is the canonical *emitter*: sorted object keys and a fixed
//! numeric rendering rule, neither of which `serde_json`'s own `Display`
//! impl guarantees.

use serde_json::Value;

use crate::error::KernelError;

/// Maximum nesting depth for objects and arrays combined.
pub const MAX_DEPTH: usize = 64;

/// Serialize `value` as canonical JSON bytes: object keys sorted by byte
/// order of their UTF-8 representation, no insignificant whitespace,
/// integers rendered unquoted with no trailing zeroes, floats rendered with
/// full round-trip precision.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, KernelError> {
    let mut out = Vec::new();
    emit(value, &mut out, 0)?;
    Ok(out)
}

fn emit(value: &Value, out: &mut Vec<u8>, depth: usize) -> Result<(), KernelError> {
    if depth > MAX_DEPTH {
        return Err(KernelError::MalformedExport("max nesting depth exceeded".into()));
    }
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => emit_number(n, out)?,
        Value::String(s) => emit_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                emit(item, out, depth + 1)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                emit_string(key, out);
                out.push(b':');
                emit(&map[*key], out, depth + 1)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn emit_number(n: &serde_json::Number, out: &mut Vec<u8>) -> Result<(), KernelError> {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
    } else if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
    } else if let Some(f) = n.as_f64() {
        if !f.is_finite() {
            return Err(KernelError::Nan);
        }
        // Rust's f64 Display is the shortest string that round-trips, which
        // is exactly "full precision, no trailing zeroes" (spec §4.6).
        let mut s = f.to_string();
        if !s.contains('.') && !s.contains('e') && !s.contains('E') {
            s.push_str(".0");
        }
        out.extend_from_slice(s.as_bytes());
    } else {
        return Err(KernelError::MalformedExport("unrepresentable number".into()));
    }
    Ok(())
}

fn emit_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for ch in s.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_keys_are_sorted() {
        let v = json!({"b": 1, "a": 2});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 3});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":3,"z":{"x":2,"y":1}}"#
        );
    }

    #[test]
    fn integers_render_unquoted_without_decimal() {
        let v = json!({"n": 42});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"n":42}"#);
    }

    #[test]
    fn floats_render_with_no_trailing_zeroes() {
        let v = json!({"n": 1.5});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"n":1.5}"#);
    }

    #[test]
    fn same_value_produces_same_bytes_regardless_of_input_order() {
        let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
        let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn string_escaping_is_stable() {
        let v = json!({"s": "a\"b\\c\n"});
        let bytes = canonicalize(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"s":"a\"b\\c\n"}"#);
    }
}

//! Cache Key Module
//!
//! Builds namespace-qualified cache keys. Keys longer than [`MAX_RAW_KEY_CHARS`]
//! characters are replaced by `prefix:hash:<md5>`.
//!
//! The canonical form is `prefix:` followed by the `:`-joined positional args
//! and, when present, `:` plus the keyword args as JSON with sorted keys,
//! `", "` / `": "` separators and non-ASCII escaped.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;

/// Longest canonical key, in characters, that is used verbatim.
pub const MAX_RAW_KEY_CHARS: usize = 250;

// == Make Key ==
/// Builds a cache key from a prefix, positional args and keyword args.
///
/// Positional args are joined to the prefix with `:`. Keyword args, if any,
/// are appended as a JSON object with sorted keys, so their order never
/// affects the result. The prefix is always followed by `:`, even with no args.
///
/// # Example
/// ```
/// use serde_json::json;
/// use tiered_cache::cache::make_key;
///
/// let key = make_key("prompts", &[&"user", &42], &[("page", json!(2))]);
/// assert_eq!(key, r#"prompts:user:42:{"page": 2}"#);
/// assert_eq!(make_key("templates", &[], &[]), "templates:");
/// ```
pub fn make_key(prefix: &str, args: &[&dyn Display], kwargs: &[(&str, Value)]) -> String {
    let mut builder = KeyBuilder::new(prefix);
    for arg in args {
        builder = builder.arg(arg);
    }
    for (name, value) in kwargs {
        builder = builder.kwarg(*name, value.clone());
    }
    builder.build()
}

// == Key Builder ==
/// Incremental form of [`make_key`].
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    prefix: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, Value>,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Appends a positional segment.
    pub fn arg(mut self, arg: impl Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Sets a keyword segment. Setting the same name twice keeps the last value.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Returns the canonical key, hashed if it is too long.
    pub fn build(self) -> String {
        let mut key = format!("{}:{}", self.prefix, self.args.join(":"));

        if !self.kwargs.is_empty() {
            key.push(':');
            key.push_str(&encode_kwargs(&self.kwargs));
        }

        if key.chars().count() > MAX_RAW_KEY_CHARS {
            return hashed_key(&self.prefix, &key);
        }
        key
    }
}

// == Kwarg Encoding ==
/// Writes JSON with spaced separators and `\uXXXX` escapes for non-ASCII.
struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// BTreeMap serializes in key order. A map of Values cannot fail to encode,
/// so an error only yields an empty segment.
fn encode_kwargs(kwargs: &BTreeMap<String, Value>) -> String {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedAsciiFormatter);
    if kwargs.serialize(&mut serializer).is_err() {
        return String::new();
    }
    String::from_utf8(out).unwrap_or_default()
}

/// Returns `prefix:hash:<md5 of canonical>`.
pub fn hashed_key(prefix: &str, canonical: &str) -> String {
    format!("{}:hash:{:x}", prefix, md5::compute(canonical.as_bytes()))
}

//! Reference text engines
//!
//! Both engines speak the same `name=value;name=value` format and differ only
//! in their default flags: the legacy engine enables every flag, the strict
//! engine none. Explicit caller flags override either default.

use crate::record::{RawText, TextRecord};
use splitcodec_core::{ConfigFlag, Decoder, Encoder, Engine, FlagSet, FlagUniverse};
use std::borrow::Cow;

pub const ALLOW_DUPLICATE_NAMES: &str = "allow_duplicate_names";
pub const ALLOW_INVALID_UTF8: &str = "allow_invalid_utf8";
pub const ESCAPE_HTML: &str = "escape_html";
pub const MATCH_CASE_INSENSITIVE_NAMES: &str = "match_case_insensitive_names";
pub const MERGE_WITH_LEGACY_SEMANTICS: &str = "merge_with_legacy_semantics";

/// Every flag the text engines understand
pub const ALL_FLAGS: [&str; 5] = [
    ALLOW_DUPLICATE_NAMES,
    ALLOW_INVALID_UTF8,
    ESCAPE_HTML,
    MATCH_CASE_INSENSITIVE_NAMES,
    MERGE_WITH_LEGACY_SEMANTICS,
];

/// Value marking an explicit null
pub const NULL_VALUE: &[u8] = b"~";

/// Flag universe of the text engines; `true` is the legacy value of each
pub fn reference_universe() -> FlagUniverse {
    FlagUniverse::new(ALL_FLAGS.map(ConfigFlag::new)).expect("flag names are unique")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextError {
    #[error("invalid utf-8 in field {0:?}")]
    InvalidUtf8(String),

    #[error("malformed segment {0:?}")]
    Syntax(String),

    #[error("duplicate field {0:?}")]
    DuplicateName(String),

    #[error("reserved character {0:?} in field {1:?}")]
    Reserved(char, String),
}

#[derive(Debug, Clone, Copy)]
struct Options {
    allow_duplicate_names: bool,
    allow_invalid_utf8: bool,
    escape_html: bool,
    match_case_insensitive_names: bool,
    merge_with_legacy_semantics: bool,
}

/// `name=value` engine
#[derive(Debug, Clone)]
pub struct TextEngine {
    name: &'static str,
    defaults: FlagSet,
}

impl TextEngine {
    /// Lenient engine: every flag on
    pub fn legacy() -> Self {
        Self {
            name: "legacy",
            defaults: ALL_FLAGS.iter().map(|f| (*f, true)).collect(),
        }
    }

    /// Strict engine: every flag off
    pub fn strict() -> Self {
        Self {
            name: "strict",
            defaults: ALL_FLAGS.iter().map(|f| (*f, false)).collect(),
        }
    }

    fn options(&self, flags: &FlagSet) -> Options {
        let effective = self.defaults.join(flags);
        let get = |name| effective.get_or(name, false);
        Options {
            allow_duplicate_names: get(ALLOW_DUPLICATE_NAMES),
            allow_invalid_utf8: get(ALLOW_INVALID_UTF8),
            escape_html: get(ESCAPE_HTML),
            match_case_insensitive_names: get(MATCH_CASE_INSENSITIVE_NAMES),
            merge_with_legacy_semantics: get(MERGE_WITH_LEGACY_SEMANTICS),
        }
    }
}

impl Engine for TextEngine {
    type Error = TextError;

    fn name(&self) -> &str {
        self.name
    }
}

impl<T: TextRecord> Encoder<T> for TextEngine {
    fn encode(&self, value: &T, flags: &FlagSet) -> Result<Vec<u8>, TextError> {
        let opts = self.options(flags);
        let fields = T::FIELDS
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, Cow::Borrowed(value.field(i))));
        encode_fields(opts, fields)
    }
}

impl Encoder<RawText> for TextEngine {
    fn encode(&self, value: &RawText, flags: &FlagSet) -> Result<Vec<u8>, TextError> {
        let opts = self.options(flags);
        let text = decode_utf8(opts, RawText::FIELD, &value.0)?;
        encode_fields(opts, std::iter::once((RawText::FIELD, text)))
    }
}

impl<T: TextRecord> Decoder<T> for TextEngine {
    fn decode(&self, input: &[u8], target: &mut T, flags: &FlagSet) -> Result<(), TextError> {
        let opts = self.options(flags);
        let mut seen = vec![false; T::FIELDS.len()];

        for segment in input.split(|b| *b == b';').filter(|s| !s.is_empty()) {
            let Some(eq) = segment.iter().position(|b| *b == b'=') else {
                return Err(TextError::Syntax(String::from_utf8_lossy(segment).into_owned()));
            };
            let (key, value) = (&segment[..eq], &segment[eq + 1..]);
            let key = std::str::from_utf8(key)
                .map_err(|_| TextError::Syntax(String::from_utf8_lossy(segment).into_owned()))?;

            let found = T::FIELDS.iter().position(|field| {
                if opts.match_case_insensitive_names {
                    field.eq_ignore_ascii_case(key)
                } else {
                    *field == key
                }
            });
            // Unknown fields are ignored.
            let Some(index) = found else { continue };

            if std::mem::replace(&mut seen[index], true) && !opts.allow_duplicate_names {
                return Err(TextError::DuplicateName(key.to_string()));
            }

            if value == NULL_VALUE {
                if !opts.merge_with_legacy_semantics {
                    target.field_mut(index).clear();
                }
                continue;
            }
            *target.field_mut(index) = decode_utf8(opts, key, value)?.into_owned();
        }
        Ok(())
    }
}

fn decode_utf8<'a>(opts: Options, field: &str, bytes: &'a [u8]) -> Result<Cow<'a, str>, TextError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(Cow::Borrowed(s)),
        Err(_) if opts.allow_invalid_utf8 => Ok(String::from_utf8_lossy(bytes)),
        Err(_) => Err(TextError::InvalidUtf8(field.to_string())),
    }
}

fn encode_fields<'a>(
    opts: Options,
    fields: impl Iterator<Item = (&'static str, Cow<'a, str>)>,
) -> Result<Vec<u8>, TextError> {
    let mut out = String::new();
    for (i, (name, value)) in fields.enumerate() {
        if let Some(c) = value.chars().find(|c| matches!(c, ';' | '=')) {
            return Err(TextError::Reserved(c, name.to_string()));
        }
        if i > 0 {
            out.push(';');
        }
        out.push_str(name);
        out.push('=');
        for c in value.chars() {
            match c {
                '<' if opts.escape_html => out.push_str("\\u003c"),
                '>' if opts.escape_html => out.push_str("\\u003e"),
                '&' if opts.escape_html => out.push_str("\\u0026"),
                c => out.push(c),
            }
        }
    }
    Ok(out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Person;

    #[test]
    fn engines_agree_on_plain_input() {
        let p = Person::new("John", "Doe");
        let flags = FlagSet::new();
        let legacy = TextEngine::legacy().encode(&p, &flags).unwrap();
        let strict = TextEngine::strict().encode(&p, &flags).unwrap();
        assert_eq!(legacy, b"firstName=John;lastName=Doe");
        assert_eq!(legacy, strict);
    }

    #[test]
    fn html_escaping_differs() {
        let p = Person::new("<b>", "A&B");
        let flags = FlagSet::new();
        assert_eq!(
            TextEngine::legacy().encode(&p, &flags).unwrap(),
            br"firstName=\u003cb\u003e;lastName=A\u0026B"
        );
        assert_eq!(TextEngine::strict().encode(&p, &flags).unwrap(), b"firstName=<b>;lastName=A&B");

        let with_flag = FlagSet::new().with(ESCAPE_HTML, true);
        assert_eq!(
            TextEngine::strict().encode(&p, &with_flag).unwrap(),
            TextEngine::legacy().encode(&p, &flags).unwrap()
        );
    }

    #[test]
    fn invalid_utf8_is_lossy_or_rejected() {
        let raw = RawText(b"caf\xff".to_vec());
        let flags = FlagSet::new();
        assert_eq!(
            TextEngine::legacy().encode(&raw, &flags).unwrap(),
            "text=caf\u{fffd}".as_bytes()
        );
        assert_eq!(
            TextEngine::strict().encode(&raw, &flags).unwrap_err(),
            TextError::InvalidUtf8("text".into())
        );
    }

    #[test]
    fn case_and_duplicates() {
        let input = b"FIRSTNAME=John;LASTNAME=Doe;lastName=Dupe";
        let flags = FlagSet::new();

        let mut legacy = Person::default();
        TextEngine::legacy().decode(input, &mut legacy, &flags).unwrap();
        assert_eq!(legacy, Person::new("John", "Dupe"));

        let mut strict = Person::default();
        TextEngine::strict().decode(input, &mut strict, &flags).unwrap();
        assert_eq!(strict, Person::new("", "Dupe"));

        let mut dup = Person::default();
        let no_dups = FlagSet::new().with(ALLOW_DUPLICATE_NAMES, false);
        assert_eq!(
            TextEngine::legacy().decode(input, &mut dup, &no_dups).unwrap_err(),
            TextError::DuplicateName("lastName".into())
        );
    }

    #[test]
    fn null_merges_or_resets() {
        let input = b"firstName=~;lastName=Smith";
        let flags = FlagSet::new();

        let mut legacy = Person::new("Ann", "Lee");
        TextEngine::legacy().decode(input, &mut legacy, &flags).unwrap();
        assert_eq!(legacy, Person::new("Ann", "Smith"));

        let mut strict = Person::new("Ann", "Lee");
        TextEngine::strict().decode(input, &mut strict, &flags).unwrap();
        assert_eq!(strict, Person::new("", "Smith"));
    }

    #[test]
    fn malformed_and_reserved() {
        let mut p = Person::default();
        assert!(matches!(
            TextEngine::legacy().decode(b"firstName", &mut p, &FlagSet::new()),
            Err(TextError::Syntax(_))
        ));
        assert_eq!(
            TextEngine::legacy()
                .encode(&Person::new("a;b", ""), &FlagSet::new())
                .unwrap_err(),
            TextError::Reserved(';', "firstName".into())
        );
    }
}

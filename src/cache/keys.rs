//! Cache key codec.
//!
//! Rendered entries are keyed by `cache:entry:<resource>:<language>`. The
//! resource identifier is an IRI and may itself contain `:`; it is stored
//! percent-encoded so the language tag is always the final segment.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, percent_encode};
use thiserror::Error;

/// Namespace segment shared by every key this service owns.
pub const KEY_PREFIX: &str = "cache";
/// Segment marking rendered entry keys.
pub const ENTRY_SEGMENT: &str = "entry";

/// Only the key separator is escaped. Anything broader would round-trip
/// too, but keys stay readable in the store when the IRI survives intact.
const RESOURCE_SET: &AsciiSet = &CONTROLS.add(b':');

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key `{0}` is not in the cache entry namespace")]
    WrongNamespace(String),
    #[error("key `{0}` is missing a resource or language segment")]
    MissingSegment(String),
    #[error("key `{0}` holds an undecodable resource segment")]
    BadEncoding(String),
}

/// Build the storage key for one rendered resource in one language.
pub fn entry_key(resource: &str, language: &str) -> String {
    format!(
        "{KEY_PREFIX}:{ENTRY_SEGMENT}:{}:{language}",
        percent_encode(resource.as_bytes(), RESOURCE_SET)
    )
}

/// Split an entry key back into `(resource, language)`.
pub fn parse_entry_key(key: &str) -> Result<(String, String), KeyError> {
    let parts: Vec<&str> = key.split(':').collect();
    if parts.len() < 4 {
        return Err(KeyError::MissingSegment(key.to_owned()));
    }
    if parts[0] != KEY_PREFIX || parts[1] != ENTRY_SEGMENT {
        return Err(KeyError::WrongNamespace(key.to_owned()));
    }
    let language = parts[parts.len() - 1];
    if language.is_empty() {
        return Err(KeyError::MissingSegment(key.to_owned()));
    }
    let encoded = parts[2..parts.len() - 1].join(":");
    if encoded.is_empty() {
        return Err(KeyError::MissingSegment(key.to_owned()));
    }
    let resource = percent_decode_str(&encoded)
        .decode_utf8()
        .map_err(|_| KeyError::BadEncoding(key.to_owned()))?
        .into_owned();
    Ok((resource, language.to_owned()))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn iri_colons_are_escaped() {
        assert_eq!(
            entry_key("https://example.com/resource/1", "en"),
            "cache:entry:https%3A//example.com/resource/1:en"
        );
    }

    #[test]
    fn parse_recovers_resource_and_language() {
        let (resource, language) =
            parse_entry_key("cache:entry:https%3A//example.com/resource/1:en").expect("valid key");
        assert_eq!(resource, "https://example.com/resource/1");
        assert_eq!(language, "en");
    }

    #[test]
    fn foreign_namespaces_are_rejected() {
        assert_eq!(
            parse_entry_key("session:entry:x:en"),
            Err(KeyError::WrongNamespace("session:entry:x:en".to_owned()))
        );
        assert_eq!(
            parse_entry_key("cache:lock:x:en"),
            Err(KeyError::WrongNamespace("cache:lock:x:en".to_owned()))
        );
    }

    #[test]
    fn truncated_keys_are_rejected() {
        assert!(matches!(
            parse_entry_key("cache:entry:x"),
            Err(KeyError::MissingSegment(_))
        ));
        assert!(matches!(
            parse_entry_key("cache:entry::en"),
            Err(KeyError::MissingSegment(_))
        ));
    }

    proptest! {
        #[test]
        fn round_trips(
            resource in "[a-z]+://[A-Za-z0-9./_-]{1,40}",
            language in "[a-z]{2,3}",
        ) {
            let key = entry_key(&resource, &language);
            let (back_resource, back_language) = parse_entry_key(&key).expect("own keys parse");
            prop_assert_eq!(back_resource, resource);
            prop_assert_eq!(back_language, language);
        }
    }
}

//! Content fingerprint of the semantically relevant run configuration.
//!
//! Only the fields that change what the model is asked take part: model,
//! prompt, temperature, token budget and the debug flag. Concurrency and
//! output location are left out, so runs that differ only in those can resume
//! from each other.
//!
//! The digest input is JSON with sorted keys, `", "` and `": "` separators and
//! every character outside printable ASCII written as a `\uXXXX` escape
//! (UTF-16 surrogate pairs above the BMP). Snapshots named by earlier
//! collector versions, which used that encoding, stay resumable.

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use sha2::{Digest, Sha256};

use crate::error::CollectorResult;

/// The configuration subset that identifies a collection.
///
/// Fields are declared in lexicographic order of their serialized names so
/// the JSON encoding has a fixed key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunKey {
    pub debug: bool,
    pub max_tokens: u32,
    pub model: String,
    pub prompt: String,
    #[serde(rename = "temp")]
    pub temperature: f64,
}

impl RunKey {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f64,
        max_tokens: u32,
        debug: bool,
    ) -> Self {
        Self {
            debug,
            max_tokens,
            model: model.into(),
            prompt: prompt.into(),
            temperature,
        }
    }

    /// The exact bytes that are hashed.
    pub fn canonical_json(&self) -> CollectorResult<Vec<u8>> {
        let mut encoded = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut encoded, AsciiFormatter);
        self.serialize(&mut serializer)?;
        Ok(encoded)
    }

    /// SHA-256 over [`RunKey::canonical_json`].
    pub fn fingerprint(&self) -> CollectorResult<Fingerprint> {
        let encoded = self.canonical_json()?;
        Ok(Fingerprint(hex::encode(Sha256::digest(&encoded))))
    }
}

/// Spaced separators, ASCII-only string contents.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        // Quotes, backslashes and C0 controls never reach here; DEL does.
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if (' '..='~').contains(&ch) {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 digest identifying a [`RunKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already computed digest, e.g. one parsed from a filename.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RunKey {
        RunKey::new("gpt-4.1-mini", "Say a number", 1.0, 50, false)
    }

    fn canonical(key: &RunKey) -> String {
        String::from_utf8(key.canonical_json().unwrap()).unwrap()
    }

    #[test]
    fn test_encoding_has_sorted_keys_and_spaced_separators() {
        assert_eq!(
            canonical(&key()),
            r#"{"debug": false, "max_tokens": 50, "model": "gpt-4.1-mini", "prompt": "Say a number", "temp": 1.0}"#
        );
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        let key = RunKey {
            prompt: "emoji \u{1F600} and\ttab\u{7f}".into(),
            ..key()
        };
        assert!(canonical(&key)
            .contains(r#""prompt": "emoji \ud83d\ude00 and\ttab\u007f""#));
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            key().fingerprint().unwrap().as_str(),
            "7c1933348140f5bb7c4f1aef3bb809b91f4be35dde2bfa67a7d5ef42dc2533b3"
        );

        let japanese = RunKey {
            prompt: "北海道の県庁所在地は？".into(),
            ..key()
        };
        assert_eq!(
            japanese.fingerprint().unwrap().as_str(),
            "83f99961da2e830f61650e58bdecadc1a70ae5e235cde3ef9425ea211c00e1ea"
        );

        let astral = RunKey {
            prompt: "emoji \u{1F600} and\ttab\u{7f}".into(),
            ..key()
        };
        assert_eq!(
            astral.fingerprint().unwrap().as_str(),
            "c9665077466001cce8369fa64dd0bf1ee5de6b72cd480d02e4e11bf03a2b0e0e"
        );
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = key().fingerprint().unwrap();
        let b = key().fingerprint().unwrap();

        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_every_field_changes_fingerprint() {
        let base = key().fingerprint().unwrap();
        let variants = [
            RunKey { model: "other".into(), ..key() },
            RunKey { prompt: "Say a word".into(), ..key() },
            RunKey { temperature: 0.7, ..key() },
            RunKey { max_tokens: 51, ..key() },
            RunKey { debug: true, ..key() },
        ];

        for variant in variants {
            assert_ne!(variant.fingerprint().unwrap(), base, "{variant:?}");
        }
    }
}

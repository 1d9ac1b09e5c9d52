//! Payload Extraction
//!
//! Pulls the result payload out of a finished page and cleans it up:
//! HTML entity decoding and JSON sanity checks.

use crate::error::{Error, Result};
use crate::page::{Page, TextMatch};

/// Where to read the payload from once the page is ready
#[derive(Debug, Clone)]
pub enum ExtractionSource {
    /// Read an attribute off an element (copy-button style payloads)
    Attribute {
        selector: String,
        attribute: String,
    },
    /// Concatenate the text of everything rendered after a heading
    AfterHeading { text: String },
}

/// Decode the HTML entities that show up in attribute-embedded payloads
///
/// Handles the named entities a templating layer emits when escaping JSON
/// into an attribute, plus numeric character references.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        if c != '&' {
            out.push(c);
            continue;
        }

        // Find the terminating semicolon within a reasonable distance
        let rest = &input[i..];
        let semi = rest.char_indices().take(12).find(|&(_, c)| c == ';');

        let Some((semi_off, _)) = semi else {
            out.push('&');
            continue;
        };

        let entity = &rest[1..semi_off];
        let decoded = match entity {
            "quot" => Some('"'),
            "amp" => Some('&'),
            "apos" => Some('\''),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "nbsp" => Some('\u{a0}'),
            _ => {
                if let Some(num) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
                } else if let Some(num) = entity.strip_prefix('#') {
                    num.parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    None
                }
            }
        };

        match decoded {
            Some(ch) => {
                out.push(ch);
                // Skip past the entity body and semicolon
                for _ in 0..semi_off {
                    chars.next();
                }
            }
            None => out.push('&'),
        }
    }

    out
}

/// Whether the string parses as JSON
pub fn is_valid_json(s: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(s).is_ok()
}

/// Cheap shape check: trimmed string starts with '{' and ends with '}'
///
/// Used while polling so a half-rendered attribute isn't declared done
/// before the closing brace lands.
pub fn looks_like_json_object(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.starts_with('{') && trimmed.ends_with('}')
}

/// Read a payload from an element attribute, decoding entities
pub async fn extract_attribute(page: &Page, selector: &str, attribute: &str) -> Result<String> {
    let element = page.find(selector).await?;

    let raw = element.get_attribute(attribute).await?.ok_or_else(|| {
        Error::Extraction(format!(
            "Element '{}' has no '{}' attribute",
            selector, attribute
        ))
    })?;

    let decoded = decode_entities(&raw);
    if decoded.trim().is_empty() {
        return Err(Error::Extraction(format!(
            "Attribute '{}' on '{}' is empty",
            attribute, selector
        )));
    }

    Ok(decoded)
}

/// Read the payload rendered after a heading with the given text
///
/// Finds the heading by exact trimmed text, then concatenates the text of
/// its following siblings. Streamlit-style apps render results as several
/// adjacent blocks under the heading, so a single node read misses parts.
pub async fn extract_after_heading(page: &Page, heading_text: &str) -> Result<String> {
    let heading = page
        .find_by_text_match(heading_text, TextMatch::Exact)
        .await
        .map_err(|_| {
            Error::Extraction(format!("Heading '{}' not found on page", heading_text))
        })?;

    let raw = heading.following_text().await?;
    let decoded = decode_entities(&raw);

    if decoded.trim().is_empty() {
        return Err(Error::Extraction(format!(
            "No content found after heading '{}'",
            heading_text
        )));
    }

    Ok(decoded)
}

/// Run extraction against a page per the configured source
pub async fn extract(page: &Page, source: &ExtractionSource) -> Result<String> {
    match source {
        ExtractionSource::Attribute {
            selector,
            attribute,
        } => extract_attribute(page, selector, attribute).await,
        ExtractionSource::AfterHeading { text } => extract_after_heading(page, text).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_entities() {
        assert_eq!(
            decode_entities("{&quot;key&quot;: &quot;a &amp; b&quot;}"),
            r#"{"key": "a & b"}"#
        );
        assert_eq!(decode_entities("&lt;tag&gt;"), "<tag>");
        assert_eq!(decode_entities("it&apos;s"), "it's");
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_entities("&#39;quoted&#39;"), "'quoted'");
        assert_eq!(decode_entities("&#x27;hex&#x27;"), "'hex'");
    }

    #[test]
    fn test_decode_leaves_bare_ampersands() {
        assert_eq!(decode_entities("fish & chips"), "fish & chips");
        assert_eq!(decode_entities("a &unknown; b"), "a &unknown; b");
        assert_eq!(decode_entities("trailing &"), "trailing &");
    }

    #[test]
    fn test_decode_passthrough() {
        let plain = r#"{"chunks": ["one", "two"]}"#;
        assert_eq!(decode_entities(plain), plain);
    }

    #[test]
    fn test_is_valid_json() {
        assert!(is_valid_json(r#"{"a": 1}"#));
        assert!(is_valid_json("[1, 2, 3]"));
        assert!(!is_valid_json("{broken"));
        assert!(!is_valid_json(""));
    }

    #[test]
    fn test_looks_like_json_object() {
        assert!(looks_like_json_object(r#"{"a": 1}"#));
        assert!(looks_like_json_object("  {\"a\": 1}\n"));
        assert!(!looks_like_json_object(r#"{"a": 1"#));
        assert!(!looks_like_json_object("[1, 2]"));
        assert!(!looks_like_json_object("plain text"));
    }

    #[test]
    fn test_decoded_escaped_json_validates() {
        let escaped = "{&quot;chunks&quot;: [&quot;alpha&quot;, &quot;beta&quot;]}";
        let decoded = decode_entities(escaped);
        assert!(is_valid_json(&decoded));
        assert!(looks_like_json_object(&decoded));
    }
}

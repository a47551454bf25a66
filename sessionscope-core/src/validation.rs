// Copyright 2025 SessionScope (https://github.com/sessionscope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Field-limit validation shared by the gateway and the capture agent.

use crate::error::{Error, Result};

/// Maximum length for free-text fields: payloads, URIs, reasons,
/// identifiers, and tags. Measured in characters, not bytes.
pub const MAX_TEXT_FIELD_LEN: usize = 500;

/// Event types must be non-empty.
pub fn validate_event_type(event_type: &str) -> Result<()> {
    if event_type.is_empty() {
        return Err(Error::Validation(
            "\"type\" must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

/// Optional free-text field bounded by [`MAX_TEXT_FIELD_LEN`].
pub fn validate_optional_text(value: Option<&str>, field: &str) -> Result<()> {
    if let Some(text) = value {
        if text.chars().count() > MAX_TEXT_FIELD_LEN {
            return Err(Error::Validation(format!(
                "\"{}\" must be a <{} characters string",
                field,
                MAX_TEXT_FIELD_LEN + 1
            )));
        }
    }
    Ok(())
}

/// Sub-user identifiers: 1..=500 characters.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(Error::Validation(
            "\"identifier\" must be a non-empty string".to_string(),
        ));
    }
    if identifier.chars().count() > MAX_TEXT_FIELD_LEN {
        return Err(Error::Validation(format!(
            "\"identifier\" must be at most {} characters",
            MAX_TEXT_FIELD_LEN
        )));
    }
    Ok(())
}

/// Session tags: each 1..=500 characters.
pub fn validate_tags(tags: &[String]) -> Result<()> {
    for tag in tags {
        if tag.is_empty() || tag.chars().count() > MAX_TEXT_FIELD_LEN {
            return Err(Error::Validation(format!(
                "tags must be non-empty strings of at most {} characters",
                MAX_TEXT_FIELD_LEN
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_must_be_non_empty() {
        assert!(validate_event_type("Click").is_ok());
        assert!(validate_event_type("").is_err());
    }

    #[test]
    fn test_optional_text_limit() {
        assert!(validate_optional_text(None, "payload").is_ok());
        assert!(validate_optional_text(Some(&"x".repeat(500)), "payload").is_ok());
        assert!(validate_optional_text(Some(&"x".repeat(501)), "payload").is_err());
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        // 500 multi-byte characters are within the limit even though the
        // byte length exceeds 500.
        let text = "é".repeat(500);
        assert!(text.len() > MAX_TEXT_FIELD_LEN);
        assert!(validate_optional_text(Some(&text), "payload").is_ok());
    }

    #[test]
    fn test_identifier_bounds() {
        assert!(validate_identifier("user-42").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"x".repeat(501)).is_err());
    }

    #[test]
    fn test_tags_bounds() {
        assert!(validate_tags(&["checkout".into(), "beta".into()]).is_ok());
        assert!(validate_tags(&["".into()]).is_err());
        assert!(validate_tags(&["x".repeat(501)]).is_err());
    }
}

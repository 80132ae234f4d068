//! Built-in answers for ubiquitous code systems.
//!
//! These systems are too large to ship as enumerations; membership is
//! decided by well-formedness, the same stance HAPI's common-code-systems
//! service takes. The provider stays silent for any other system so later
//! chain entries can answer.

use async_trait::async_trait;

use crate::types::CodeValidation;

use super::ValidationSupport;

pub const LANGUAGES_SYSTEM: &str = "urn:ietf:bcp:47";
pub const MIME_TYPES_SYSTEM: &str = "urn:ietf:bcp:13";
pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";
pub const CURRENCIES_SYSTEM: &str = "urn:iso:std:iso:4217";

pub struct CommonCodeSystemsSupport;

impl CommonCodeSystemsSupport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CommonCodeSystemsSupport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationSupport for CommonCodeSystemsSupport {
    fn name(&self) -> &str {
        "common-code-systems"
    }

    async fn validate_code(
        &self,
        system: Option<&str>,
        code: &str,
        _value_set_url: Option<&str>,
    ) -> Option<CodeValidation> {
        let verdict = match system? {
            LANGUAGES_SYSTEM => is_well_formed_language_tag(code),
            MIME_TYPES_SYSTEM => is_well_formed_mime_type(code),
            UCUM_SYSTEM => is_well_formed_ucum_unit(code),
            CURRENCIES_SYSTEM => is_well_formed_currency(code),
            _ => return None,
        };
        Some(if verdict {
            CodeValidation::valid()
        } else {
            CodeValidation::invalid_with_message(format!("'{code}' is not a well-formed code"))
        })
    }
}

/// BCP-47: 2-3 letter primary subtag, optional alphanumeric subtags.
fn is_well_formed_language_tag(code: &str) -> bool {
    let mut subtags = code.split('-');
    let Some(primary) = subtags.next() else {
        return false;
    };
    if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    subtags.all(|s| !s.is_empty() && s.len() <= 8 && s.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// BCP-13: `type/subtype`, both non-empty tokens.
fn is_well_formed_mime_type(code: &str) -> bool {
    match code.split_once('/') {
        Some((t, s)) => {
            !t.is_empty()
                && !s.is_empty()
                && !t.contains(char::is_whitespace)
                && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// UCUM units are printable ASCII without whitespace; full grammar checking
/// is the terminology server's job.
fn is_well_formed_ucum_unit(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_graphic())
}

/// ISO 4217: exactly three ASCII letters, conventionally upper-case.
fn is_well_formed_currency(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

//! Outgoing message envelope
//!
//! Builds the plain-text MIME envelope Gmail expects in the `raw` field of
//! `users.messages.send` and encodes it as web-safe base64.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Loose `local@domain` shape check, only used to warn
static ADDRESS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap());

/// Fixed header block placed before the per-message headers
const MIME_HEADERS: &str = concat!(
    "Content-Type: text/plain; charset=\"UTF-8\"\n",
    "MIME-Version: 1.0\n",
    "Content-Transfer-Encoding: 7bit\n",
);

/// Message as submitted by API callers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailMessage {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Header field '{0}' must not contain line breaks")]
    HeaderInjection(&'static str),
}

impl MailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Reject messages that cannot be turned into a well-formed envelope.
    ///
    /// The recipient shape is only checked loosely: an address that does not
    /// look like `local@domain` is logged and still accepted.
    pub fn validate(&self) -> Result<(), MessageError> {
        for (name, value) in [("to", &self.to), ("subject", &self.subject), ("body", &self.body)] {
            if value.trim().is_empty() {
                return Err(MessageError::MissingField(name));
            }
        }

        for (name, value) in [("to", &self.to), ("subject", &self.subject)] {
            if value.contains(['\r', '\n']) {
                return Err(MessageError::HeaderInjection(name));
            }
        }

        if !ADDRESS_PATTERN.is_match(self.to.trim()) {
            tracing::warn!("Recipient '{}' does not look like an email address", self.to);
        }

        Ok(())
    }
}

/// Render the plain-text envelope for `message` sent as `from`
pub fn build_envelope(message: &MailMessage, from: &str) -> String {
    format!(
        "{MIME_HEADERS}to: {}\nfrom: {}\nsubject: {}\n\n{}",
        message.to, from, message.subject, message.body
    )
}

/// Standard base64 with `+` and `/` swapped for `-` and `_`, padding kept
pub fn encode_web_safe(envelope: &str) -> String {
    URL_SAFE.encode(envelope.as_bytes())
}

/// Inverse of [`encode_web_safe`]
pub fn decode_web_safe(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE.decode(encoded)
}

/// Build and encode the `raw` payload in one step
pub fn encode_message(message: &MailMessage, from: &str) -> String {
    encode_web_safe(&build_envelope(message, from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use proptest::prelude::*;

    #[test]
    fn test_envelope_layout() {
        let message = MailMessage::new("a@b.com", "S", "B");
        let envelope = build_envelope(&message, "sender@example.com");

        assert_eq!(
            envelope,
            "Content-Type: text/plain; charset=\"UTF-8\"\n\
             MIME-Version: 1.0\n\
             Content-Transfer-Encoding: 7bit\n\
             to: a@b.com\n\
             from: sender@example.com\n\
             subject: S\n\
             \n\
             B"
        );
    }

    #[test]
    fn test_encoded_message_decodes_to_headers_and_body() {
        let message = MailMessage::new("a@b.com", "S", "B");
        let encoded = encode_message(&message, "sender@example.com");

        let decoded = String::from_utf8(decode_web_safe(&encoded).unwrap()).unwrap();
        let lines: Vec<&str> = decoded.lines().collect();

        assert!(lines.contains(&"to: a@b.com"));
        assert!(lines.contains(&"subject: S"));
        let blank = lines.iter().position(|l| l.is_empty()).unwrap();
        assert_eq!(lines[blank - 1], "subject: S");
        assert_eq!(lines[blank + 1], "B");
    }

    #[test]
    fn test_web_safe_substitution() {
        // 0xfb 0xff encodes to "+/8=" in the standard alphabet
        let bytes = [0xfbu8, 0xff];
        assert_eq!(STANDARD.encode(bytes), "+/8=");
        assert_eq!(URL_SAFE.encode(bytes), "-_8=");

        let envelope = "subject: ~~~???>>>\n\n\u{00ff}\u{00fe}";
        let expected = STANDARD
            .encode(envelope.as_bytes())
            .replace('+', "-")
            .replace('/', "_");
        assert_eq!(encode_web_safe(envelope), expected);
    }

    #[test]
    fn test_padding_is_retained() {
        assert_eq!(encode_web_safe("a"), "YQ==");
        assert_eq!(encode_web_safe("ab"), "YWI=");
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let message = MailMessage::new("a@b.com", "", "B");
        assert_eq!(message.validate(), Err(MessageError::MissingField("subject")));

        let message = MailMessage::new("  ", "S", "B");
        assert_eq!(message.validate(), Err(MessageError::MissingField("to")));
    }

    #[test]
    fn test_validate_rejects_header_line_breaks() {
        let message = MailMessage::new("a@b.com\nbcc: evil@x.com", "S", "B");
        assert_eq!(message.validate(), Err(MessageError::HeaderInjection("to")));

        let message = MailMessage::new("a@b.com", "S\r\nX: y", "B");
        assert_eq!(message.validate(), Err(MessageError::HeaderInjection("subject")));
    }

    #[test]
    fn test_validate_accepts_implausible_address() {
        let message = MailMessage::new("not-an-address", "S", "multi\nline\nbody");
        assert!(message.validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_decode_then_reencode_is_identical(
            to in "[a-z]{1,12}@[a-z]{1,8}\\.com",
            subject in "\\PC{1,40}",
            body in "\\PC{1,200}",
        ) {
            let message = MailMessage::new(to, subject, body);
            let encoded = encode_message(&message, "sender@example.com");
            let decoded = decode_web_safe(&encoded).unwrap();
            prop_assert_eq!(URL_SAFE.encode(&decoded), encoded.clone());
            prop_assert!(!encoded.contains('+'));
            prop_assert!(!encoded.contains('/'));
        }

        #[test]
        fn prop_encoding_is_deterministic(body in "\\PC{0,200}") {
            let message = MailMessage::new("a@b.com", "S", body);
            prop_assert_eq!(
                encode_message(&message, "me@example.com"),
                encode_message(&message, "me@example.com")
            );
        }
    }
}

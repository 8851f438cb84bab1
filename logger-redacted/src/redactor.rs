use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::LoggerError;

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    // 12 digits, optionally grouped 4-4-4; never starts with 0 or 1.
    // A leading '+' marks an international phone number instead.
    static ref AADHAAR_REGEX: Regex = Regex::new(r"\+?\b[2-9]\d{3}[-\s]?\d{4}[-\s]?\d{4}\b").unwrap();
    // Indian mobile numbers with optional +91 prefix
    static ref PHONE_REGEX: Regex = Regex::new(r"(?:\+91[-\s]?|\b)[6-9]\d{4}[-\s]?\d{5}\b").unwrap();
    static ref IP_REGEX: Regex = Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap();

    static ref DEFAULT_REDACTOR: PiiRedactor = PiiRedactor::default();
}

/// Redact `text` with the default configuration.
pub fn redact(text: &str) -> String {
    DEFAULT_REDACTOR.redact(text)
}

/// PII redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_aadhaar: bool,
    pub redact_ip_addresses: bool,
    /// Replace values with a short SHA-256 digest so repeated occurrences
    /// can still be correlated across log lines
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_aadhaar: true,
            redact_ip_addresses: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

impl RedactionConfig {
    pub fn with_custom_pattern(mut self, pattern: &str, replacement: &str) -> Result<Self, LoggerError> {
        let regex = Regex::new(pattern)?;
        self.custom_patterns.push((regex, replacement.to_string()));
        Ok(self)
    }
}

/// PII redactor for diagnostic strings
#[derive(Debug, Clone, Default)]
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        if self.config.redact_emails {
            result = self.redact_emails(&result);
        }

        // Aadhaar before phones: a 12-digit id must not be half-matched as a mobile
        if self.config.redact_aadhaar {
            result = self.redact_aadhaar(&result);
        }

        if self.config.redact_phones {
            result = self.redact_phones(&result);
        }

        if self.config.redact_ip_addresses {
            result = self.redact_ip_addresses(&result);
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    fn redact_emails(&self, text: &str) -> String {
        EMAIL_REGEX
            .replace_all(text, |caps: &Captures| {
                let email = &caps[0];
                if self.config.hash_for_correlation {
                    return format!("EMAIL[{}]", self.hash_value(email));
                }
                match email.split_once('@') {
                    Some((local, domain)) => {
                        format!("{}***@{}***", first_char(local), first_char(domain))
                    }
                    None => "***@***".to_string(),
                }
            })
            .to_string()
    }

    fn redact_aadhaar(&self, text: &str) -> String {
        AADHAAR_REGEX
            .replace_all(text, |caps: &Captures| {
                if caps[0].starts_with('+') {
                    return caps[0].to_string();
                }
                if self.config.hash_for_correlation {
                    format!("AADHAAR[{}]", self.hash_value(&digits(&caps[0])))
                } else {
                    format!("XXXX-XXXX-{}", last_n(&digits(&caps[0]), 4))
                }
            })
            .to_string()
    }

    fn redact_phones(&self, text: &str) -> String {
        PHONE_REGEX
            .replace_all(text, |caps: &Captures| {
                let number = digits(&caps[0]);
                let national = last_n(&number, 10);
                if self.config.hash_for_correlation {
                    format!("PHONE[{}]", self.hash_value(national))
                } else {
                    format!("*******{}", last_n(national, 3))
                }
            })
            .to_string()
    }

    fn redact_ip_addresses(&self, text: &str) -> String {
        IP_REGEX
            .replace_all(text, |caps: &Captures| {
                let ip = &caps[0];
                if self.config.hash_for_correlation {
                    return format!("IP[{}]", self.hash_value(ip));
                }
                match ip.split('.').collect::<Vec<_>>().as_slice() {
                    [first, _, _, last] => format!("{}.***.***.{}", first, last),
                    _ => "***.***.***.***".to_string(),
                }
            })
            .to_string()
    }

    fn hash_value(&self, value: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.as_bytes());
        let result = hasher.finalize();
        general_purpose::STANDARD.encode(&result[..8]) // first 8 bytes keep it short
    }
}

fn first_char(s: &str) -> &str {
    s.char_indices().nth(1).map_or(s, |(i, _)| &s[..i])
}

fn digits(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

fn last_n(s: &str, n: usize) -> &str {
    &s[s.len().saturating_sub(n)..]
}

use lazy_static::lazy_static;
use regex::Regex;

// Known per-provider key shapes. Providers rotate prefixes occasionally, so
// these stay loose: they catch pasted garbage and truncation, nothing more.
// Providers not listed here fall through to the generic pattern.
lazy_static! {
    static ref GENERIC_KEY: Regex = Regex::new(r"^[\x21-\x7e]{8,}$").unwrap();
    static ref PROVIDER_KEYS: [(&'static str, Regex); 4] = [
        ("openai", Regex::new(r"^sk-[A-Za-z0-9_-]{20,}$").unwrap()),
        ("anthropic", Regex::new(r"^sk-ant-[A-Za-z0-9_-]{20,}$").unwrap()),
        ("groq", Regex::new(r"^gsk_[A-Za-z0-9]{20,}$").unwrap()),
        ("openrouter", Regex::new(r"^sk-or-[A-Za-z0-9_-]{20,}$").unwrap()),
    ];
}

const MIN_KEY_LENGTH: usize = 8;

/// Format-only validity check for a resolved secret. Never touches the
/// network.
pub(crate) fn is_plausible_key(provider: &str, secret: &str) -> bool {
    let secret = secret.trim();

    if secret.len() < MIN_KEY_LENGTH {
        return false;
    }

    let provider = provider.trim().to_lowercase();

    for (name, pattern) in PROVIDER_KEYS.iter() {
        if *name == provider {
            return pattern.is_match(secret);
        }
    }

    GENERIC_KEY.is_match(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secrets_are_rejected() {
        assert!(!is_plausible_key("groq", "abc"));
        assert!(!is_plausible_key("unknown", ""));
    }

    #[test]
    fn provider_patterns_apply_when_known() {
        assert!(is_plausible_key(
            "groq",
            "gsk_AbCdEfGhIjKlMnOpQrStUvWx"
        ));
        assert!(!is_plausible_key("groq", "sk-AbCdEfGhIjKlMnOpQrStUvWx"));
        assert!(is_plausible_key(
            "Anthropic",
            "sk-ant-REDACTED"
        ));
    }

    #[test]
    fn unknown_providers_use_generic_pattern() {
        assert!(is_plausible_key("mistral", "whatever-token-12345"));
        assert!(!is_plausible_key("mistral", "has spaces in it"));
    }
}

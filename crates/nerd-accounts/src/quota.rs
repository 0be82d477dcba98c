//! Fixed `(family, model) -> quota_key` table (spec.md §6.2).

/// Derive the quota key an account's rate-limit bookkeeping is keyed
/// under for a given `family`/`model` pair.
pub fn quota_key(family: &str, model: &str) -> String {
    match family {
        "claude" => "claude".to_string(),
        "gemini" => {
            if model.contains("antigravity") {
                "gemini-antigravity".to_string()
            } else {
                "gemini-cli".to_string()
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_ignores_model() {
        assert_eq!(quota_key("claude", "opus"), "claude");
        assert_eq!(quota_key("claude", ""), "claude");
    }

    #[test]
    fn gemini_splits_on_antigravity_substring() {
        assert_eq!(quota_key("gemini", "gemini-antigravity-pro"), "gemini-antigravity");
        assert_eq!(quota_key("gemini", "gemini-2.5-flash"), "gemini-cli");
    }

    #[test]
    fn unknown_family_passes_through() {
        assert_eq!(quota_key("openai", "gpt-4"), "openai");
    }
}

use std::fmt;

use thiserror::Error;

pub const DEFAULT_MIN_LENGTH: usize = 6;

/// One requirement a share password must meet.
/// 分享密碼必須符合的單一規則。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PasswordRule {
    MinLength(usize),
    Digit,
    Symbol,
    Uppercase,
    Lowercase,
}

impl PasswordRule {
    fn is_met(self, password: &str) -> bool {
        match self {
            PasswordRule::MinLength(min) => password.chars().count() >= min,
            PasswordRule::Digit => password.chars().any(|c| c.is_ascii_digit()),
            PasswordRule::Symbol => password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            PasswordRule::Uppercase => password.chars().any(char::is_uppercase),
            PasswordRule::Lowercase => password.chars().any(char::is_lowercase),
        }
    }
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordRule::MinLength(min) => write!(f, "at least {min} characters"),
            PasswordRule::Digit => f.write_str("a digit"),
            PasswordRule::Symbol => f.write_str("a symbol"),
            PasswordRule::Uppercase => f.write_str("an uppercase letter"),
            PasswordRule::Lowercase => f.write_str("a lowercase letter"),
        }
    }
}

/// Password rejected by [`PasswordPolicy::check`]; lists every unmet rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("password must contain {}", join_rules(.failed))]
pub struct WeakPassword {
    pub failed: Vec<PasswordRule>,
}

fn join_rules(rules: &[PasswordRule]) -> String {
    rules
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strength policy applied by the sharing gate.
/// 分享流程使用的密碼強度規則。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

impl PasswordPolicy {
    pub fn rules(&self) -> [PasswordRule; 5] {
        [
            PasswordRule::MinLength(self.min_length),
            PasswordRule::Digit,
            PasswordRule::Symbol,
            PasswordRule::Uppercase,
            PasswordRule::Lowercase,
        ]
    }

    pub fn failures(&self, password: &str) -> Vec<PasswordRule> {
        self.rules()
            .into_iter()
            .filter(|rule| !rule.is_met(password))
            .collect()
    }

    pub fn check(&self, password: &str) -> Result<(), WeakPassword> {
        let failed = self.failures(password);
        if failed.is_empty() {
            Ok(())
        } else {
            Err(WeakPassword { failed })
        }
    }
}

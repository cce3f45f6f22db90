//! Password generation

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::credential::Password;

/// Characters that break connection strings or quoting in common clients
pub const DEFAULT_EXCLUDED_CHARACTERS: &str = ":/@\"'\\";

/// Policy for freshly generated passwords
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Number of characters
    pub length: usize,
    /// Printable ASCII characters never used
    pub exclude_characters: String,
    /// Require at least one lowercase letter, uppercase letter and digit
    pub require_each_class: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 32,
            exclude_characters: DEFAULT_EXCLUDED_CHARACTERS.to_string(),
            require_each_class: true,
        }
    }
}

impl PasswordPolicy {
    pub const MIN_LENGTH: usize = 16;
    pub const MAX_LENGTH: usize = 128;

    /// Printable ASCII without space, minus excluded characters
    pub fn alphabet(&self) -> Vec<char> {
        ('!'..='~')
            .filter(|c| !self.exclude_characters.contains(*c))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&self.length) {
            return Err(ConfigError::OutOfRange {
                field: "password.length",
                value: self.length,
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }

        let alphabet = self.alphabet();
        if alphabet.is_empty() {
            return Err(ConfigError::Invalid {
                field: "password.exclude_characters",
                reason: "excludes every printable character".to_string(),
            });
        }

        if self.require_each_class {
            for (class, test) in Self::classes() {
                if !alphabet.iter().any(|c| test(c)) {
                    return Err(ConfigError::Invalid {
                        field: "password.exclude_characters",
                        reason: format!("excludes every {} character", class),
                    });
                }
            }
        }

        Ok(())
    }

    /// Generate a password
    ///
    /// Assumes a policy that passed [`validate`](Self::validate).
    pub fn generate(&self) -> Password {
        let alphabet = self.alphabet();
        let mut rng = rand::rng();
        let mut chars: Vec<char> = Vec::with_capacity(self.length);

        if self.require_each_class {
            for (_, test) in Self::classes() {
                let members: Vec<char> = alphabet.iter().copied().filter(|c| test(c)).collect();
                if !members.is_empty() {
                    chars.push(members[rng.random_range(0..members.len())]);
                }
            }
        }

        while chars.len() < self.length {
            chars.push(alphabet[rng.random_range(0..alphabet.len())]);
        }

        chars.shuffle(&mut rng);
        Password::new(chars.into_iter().collect::<String>())
    }

    /// Generate a password distinct from every password in `in_use`
    pub fn generate_distinct(&self, in_use: &[&Password]) -> Password {
        loop {
            let candidate = self.generate();
            if !in_use.iter().any(|used| used.constant_time_eq(&candidate)) {
                return candidate;
            }
        }
    }

    fn classes() -> [(&'static str, fn(&char) -> bool); 3] {
        [
            ("lowercase", char::is_ascii_lowercase),
            ("uppercase", char::is_ascii_uppercase),
            ("digit", char::is_ascii_digit),
        ]
    }
}

//! Storage-name allocation for new variations.
//!
//! A proposed name goes through three steps: non-portable names are replaced
//! wholesale by a fallback, invalid names are corrected, and the result gets
//! the smallest numeric suffix that makes it unique among its siblings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Characters accepted anywhere in a name besides ASCII alphanumerics.
const DEFAULT_BODY_CHARS: &str = " _-$";
/// Characters accepted in first position besides ASCII alphanumerics.
const DEFAULT_LEADING_CHARS: &str = "_$*";
const DEFAULT_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingPolicy {
    pub max_length: usize,
    pub body_chars: String,
    pub leading_chars: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            body_chars: DEFAULT_BODY_CHARS.to_string(),
            leading_chars: DEFAULT_LEADING_CHARS.to_string(),
        }
    }
}

impl NamingPolicy {
    fn is_body_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.body_chars.contains(c)
    }

    fn is_leading_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.leading_chars.contains(c)
    }

    /// Names must contain only ASCII; anything else is replaced by a fallback.
    pub fn is_portable(&self, name: &str) -> bool {
        name.is_ascii()
    }

    pub fn is_valid(&self, name: &str) -> bool {
        let mut chars = name.chars();
        let Some(first) = chars.next() else {
            return false;
        };
        name.len() <= self.max_length
            && name.trim() == name
            && self.is_leading_char(first)
            && chars.all(|c| self.is_body_char(c))
    }

    /// Best-effort repair of an invalid name.
    pub fn correct(&self, name: &str) -> Result<String, CoreError> {
        let mapped: String = name
            .chars()
            .map(|c| if self.is_body_char(c) { c } else { ' ' })
            .collect();
        let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
        let stripped = collapsed.trim_start_matches(|c: char| !self.is_leading_char(c));
        let truncated: String = stripped.chars().take(self.max_length).collect();
        let corrected = truncated.trim_end().to_string();

        if self.is_valid(&corrected) {
            Ok(corrected)
        } else {
            Err(CoreError::InvalidName {
                proposed: name.to_string(),
            })
        }
    }
}

/// Case-insensitive set of names already taken under one aggregate.
#[derive(Debug, Clone, Default)]
pub struct SiblingNames {
    taken: HashSet<String>,
}

impl SiblingNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str) {
        self.taken.insert(name.to_ascii_lowercase());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(&name.to_ascii_lowercase())
    }
}

impl<'a> FromIterator<&'a str> for SiblingNames {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut names = Self::new();
        for name in iter {
            names.insert(name);
        }
        names
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameAllocator {
    policy: NamingPolicy,
}

impl NameAllocator {
    pub fn new(policy: NamingPolicy) -> Self {
        Self { policy }
    }

    /// Produce the final storage name for a new variation.
    ///
    /// The result is not inserted into `siblings`; callers allocating
    /// several names in a row must reserve each one themselves.
    pub fn allocate(
        &self,
        proposed: &str,
        siblings: &SiblingNames,
        fallback: &str,
    ) -> Result<String, CoreError> {
        let name = if self.policy.is_portable(proposed) {
            proposed
        } else {
            tracing::debug!(proposed, fallback, "non-portable name replaced");
            fallback
        };

        let name = if self.policy.is_valid(name) {
            name.to_string()
        } else {
            self.policy.correct(name)?
        };

        self.unique(&name, siblings)
    }

    /// Fails once the suffix alone no longer fits the length limit.
    fn unique(&self, name: &str, siblings: &SiblingNames) -> Result<String, CoreError> {
        if !siblings.contains(name) {
            return Ok(name.to_string());
        }
        let mut suffix: u32 = 1;
        loop {
            let digits = suffix.to_string();
            let room = self.policy.max_length.saturating_sub(digits.len());
            let base: String = name.chars().take(room).collect();
            let candidate = format!("{}{}", base.trim_end(), digits);
            if !self.policy.is_valid(&candidate) {
                return Err(CoreError::InvalidName {
                    proposed: name.to_string(),
                });
            }
            if !siblings.contains(&candidate) {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }
}

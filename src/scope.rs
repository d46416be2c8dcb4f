use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid value '{value}' for option '{name}'")]
    InvalidValue { name: String, value: String },
}

/// Option layer that a cursor opens while it sits inside an entry.
///
/// `push` and `pop` calls must balance; options applied after a `push` are
/// undone by the matching `pop`.
pub trait ConfigScope {
    fn push(&mut self);

    fn pop(&mut self);

    fn apply_option(&mut self, name: &str, value: &str) -> Result<(), ScopeError>;
}

impl<T: ConfigScope + ?Sized> ConfigScope for &mut T {
    fn push(&mut self) {
        (**self).push();
    }

    fn pop(&mut self) {
        (**self).pop();
    }

    fn apply_option(&mut self, name: &str, value: &str) -> Result<(), ScopeError> {
        (**self).apply_option(name, value)
    }
}

/// In-memory layered option store.
///
/// Names are matched case-insensitively. When an allow-list is configured,
/// applying any other name fails with [`ScopeError::UnknownOption`].
#[derive(Debug, Clone, Default)]
pub struct OptionStack {
    values: HashMap<String, String>,
    saved: Vec<HashMap<String, String>>,
    allowed: Option<HashSet<String>>,
}

impl OptionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: Some(
                names
                    .into_iter()
                    .map(|name| name.as_ref().to_ascii_lowercase())
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Number of scopes currently open.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

impl ConfigScope for OptionStack {
    fn push(&mut self) {
        self.saved.push(self.values.clone());
    }

    fn pop(&mut self) {
        match self.saved.pop() {
            Some(values) => self.values = values,
            None => warn!("option scope popped with none open"),
        }
    }

    fn apply_option(&mut self, name: &str, value: &str) -> Result<(), ScopeError> {
        let key = name.to_ascii_lowercase();
        if let Some(allowed) = &self.allowed {
            if !allowed.contains(&key) {
                return Err(ScopeError::UnknownOption(name.to_string()));
            }
        }
        if key.is_empty() {
            return Err(ScopeError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        self.values.insert(key, value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_restores_previous_values() {
        let mut stack = OptionStack::new();
        stack.apply_option("volume", "80").expect("apply");

        stack.push();
        stack.apply_option("Volume", "20").expect("apply");
        stack.apply_option("speed", "2").expect("apply");
        assert_eq!(stack.get("VOLUME"), Some("20"));
        assert_eq!(stack.depth(), 1);

        stack.pop();
        assert_eq!(stack.get("volume"), Some("80"));
        assert_eq!(stack.get("speed"), None);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn unbalanced_pop_is_ignored() {
        let mut stack = OptionStack::new();
        stack.apply_option("volume", "80").expect("apply");
        stack.pop();
        assert_eq!(stack.get("volume"), Some("80"));
    }

    #[test]
    fn allow_list_rejects_unknown_names() {
        let mut stack = OptionStack::with_allowed(["volume"]);
        assert!(stack.apply_option("VOLUME", "1").is_ok());
        assert_eq!(
            stack.apply_option("speed", "2"),
            Err(ScopeError::UnknownOption(String::from("speed")))
        );
    }

    fn open_with<S: ConfigScope>(mut scope: S) {
        scope.push();
        scope.apply_option("a", "b").expect("apply");
    }

    #[test]
    fn mutable_reference_forwards() {
        let mut stack = OptionStack::new();
        open_with(&mut stack);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.get("a"), Some("b"));
    }
}

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps passenger contact data so it never shows up verbatim in `{:?}` / `{}`
/// output (tracing fields, panics). Serialization passes the real value through,
/// API responses need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", redact(self.0.as_ref()))
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", redact(self.0.as_ref()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Keeps the first character and, for emails, the domain: `j*****@example.com`.
pub fn redact(value: &str) -> String {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    match value.split_once('@') {
        Some((local, domain)) => {
            let hidden = local.chars().count().saturating_sub(1).max(1);
            format!("{}{}@{}", first, "*".repeat(hidden), domain)
        }
        None => format!("{}{}", first, "*".repeat(chars.count().max(1))),
    }
}

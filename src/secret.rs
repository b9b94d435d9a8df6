use std::fmt;

/// Credential material (client secrets, access tokens, storage account keys).
///
/// SECURITY: `Debug` and `Display` never print the wrapped value. The only way
/// to read it is [`Secret::expose`], which should appear solely at the points
/// where the value leaves the process (HTTP headers, the variables artifact).
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

use serde::Serialize;

/// Permission codes granted to a single user (e.g. `movie:read`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    pub fn new(codes: Vec<String>) -> Self {
        Self(codes)
    }

    pub fn includes(&self, code: &str) -> bool {
        self.0.iter().any(|c| c == code)
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

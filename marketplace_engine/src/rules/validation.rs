use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An itemized list of human-readable validation failures.
///
/// Validation always runs to completion so that the caller sees every problem at once, and always runs before any
/// external call is made.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(transparent)]
#[error("{}", .0.join("; "))]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single<S: Into<String>>(message: S) -> Self {
        Self(vec![message.into()])
    }

    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.0.push(message.into());
    }

    /// Records `message` if `condition` does not hold.
    pub fn check<S: Into<String>>(&mut self, condition: bool, message: S) -> &mut Self {
        if !condition {
            self.push(message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Converts the collected failures into a result: `Ok(())` when nothing failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

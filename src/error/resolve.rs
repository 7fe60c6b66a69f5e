use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("'{input}' is not a recognized source scheme or an existing local path")]
    Unrecognized { input: String },

    #[error("malformed {scheme} reference: '{input}'")]
    Malformed { scheme: &'static str, input: String },
}

impl ResolveError {
    pub fn unrecognized(input: impl Into<String>) -> Self {
        Self::Unrecognized {
            input: input.into(),
        }
    }

    pub fn malformed(scheme: &'static str, input: impl Into<String>) -> Self {
        Self::Malformed {
            scheme,
            input: input.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_display() {
        let err = ResolveError::unrecognized("wat://nope");
        assert_eq!(
            err.to_string(),
            "'wat://nope' is not a recognized source scheme or an existing local path"
        );
    }
}

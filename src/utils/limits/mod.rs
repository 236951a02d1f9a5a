// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ceilings enforced while evaluating user-defined operations.

mod error;

pub use error::LimitError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_depth_message_names_both_bounds() {
        let e = LimitError::CallDepthExceeded {
            depth: 257,
            limit: 256,
        };
        assert_eq!(
            e.to_string(),
            "execution exceeded call depth limit (depth=257, limit=256)"
        );
    }
}

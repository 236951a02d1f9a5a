// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

/// Errors reported when an evaluation ceiling is enforced.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum LimitError {
    /// Reported when user-defined operations nest deeper than allowed.
    CallDepthExceeded {
        /// Depth the rejected call would have reached.
        depth: usize,
        /// Configured maximum depth.
        limit: usize,
    },
}

impl fmt::Debug for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallDepthExceeded { depth, limit } => f
                .debug_struct("CallDepthExceeded")
                .field("depth", depth)
                .field("limit", limit)
                .finish(),
        }
    }
}

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CallDepthExceeded { depth, limit } => {
                write!(
                    f,
                    "execution exceeded call depth limit (depth={}, limit={})",
                    depth, limit
                )
            }
        }
    }
}

impl core::error::Error for LimitError {}

//! Core State trait for mutation machine states.
//!
//! All machine states implement this trait, which provides pure methods for
//! inspecting state properties without side effects.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for machine states.
///
/// States are small immutable values describing where a mutation currently
/// is (idle, loading, waiting on the view, succeeded, failed).
///
/// # Required Traits
///
/// - `Clone`: states are copied into history and snapshots
/// - `PartialEq`: transition lookup compares the current state
/// - `Serialize` + `Deserialize`: snapshots are handed to the view layer
///
/// # Example
///
/// ```rust
/// use caseflow::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum PublishState {
///     Ready,
///     Publishing,
///     Published,
///     Failed,
/// }
///
/// impl State for PublishState {
///     fn name(&self) -> &str {
///         match self {
///             Self::Ready => "Ready",
///             Self::Publishing => "Publishing",
///             Self::Published => "Published",
///             Self::Failed => "Failed",
///         }
///     }
///
///     fn is_final(&self) -> bool {
///         matches!(self, Self::Published)
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Failed)
///     }
/// }
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Single-shot mutations treat success as final; repeatable ones
    /// (delete-with-retry) do not.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// The view renders error states distinctly, for example as an inline
    /// alert next to the form that still holds the user's input.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}

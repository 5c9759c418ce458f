//! Guard predicates for controlling state transitions.
//!
//! Guards are pure boolean functions over the machine context. A transition
//! whose guard returns `false` does not fire and the machine stays where it is.

use std::fmt;
use std::sync::Arc;

/// Pure predicate that determines if a transition can fire.
///
/// # Example
///
/// ```rust
/// use caseflow::core::Guard;
///
/// struct AnswerForm {
///     comment: String,
/// }
///
/// let has_comment = Guard::new(|form: &AnswerForm| !form.comment.trim().is_empty());
///
/// assert!(has_comment.check(&AnswerForm { comment: "ok".into() }));
/// assert!(!has_comment.check(&AnswerForm { comment: "  ".into() }));
/// ```
pub struct Guard<C> {
    predicate: Arc<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C> Guard<C> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and free of side effects; the
    /// machine may evaluate it any number of times.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
        }
    }

    /// Check if the guard allows the transition for this context.
    pub fn check(&self, context: &C) -> bool {
        (self.predicate)(context)
    }
}

impl<C> Clone for Guard<C> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<C> fmt::Debug for Guard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Guard(..)")
    }
}

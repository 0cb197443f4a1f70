//! Differentiation levels: the lifetime region bounding tangent validity.
//!
//! Forward-mode computation happens inside a *level*. Tangents attached to
//! dual tensors record the level that created them and are only observable
//! while that level is still on the current thread's level stack; once the
//! level exits, those associations are dead and [`crate::DualTensor`] reports
//! "no tangent". This keeps a later, unrelated differentiation pass from
//! picking up stale tangents left over from an earlier one.
//!
//! Levels are strictly nested (LIFO). [`enter_level`] returns a guard that
//! tears the level down on drop no matter how the enclosing scope is left;
//! [`LevelGuard::exit`] is the explicit, misnesting-checked variant.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AdError;

/// Identifier of a differentiation level.
///
/// Ids are allocated from a global counter and never reused, so a tangent
/// recorded under an exited level can never be confused with one recorded
/// under a later level — even across threads.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LevelId(u64);

impl LevelId {
    /// Raw id, for error reporting.
    pub fn raw(self) -> u64 {
        self.0
    }
}

static NEXT_LEVEL_ID: AtomicU64 = AtomicU64::new(1);

// Per-thread stack of active levels. Concurrent evaluations in different
// threads see disjoint stacks and share no tangent state.
thread_local! {
    static LEVEL_STACK: RefCell<Vec<LevelId>> = const { RefCell::new(Vec::new()) };
}

/// Begin a differentiation level on the current thread.
///
/// The returned guard pops the level when dropped. Levels nest: entering
/// while another level is active pushes onto the stack, and tangents
/// recorded under the outer level stay live inside the inner one.
pub fn enter_level() -> LevelGuard {
    let id = LevelId(NEXT_LEVEL_ID.fetch_add(1, Ordering::Relaxed));
    LEVEL_STACK.with(|stack| stack.borrow_mut().push(id));
    LevelGuard { id, exited: false }
}

/// Innermost active level on this thread, if any.
pub(crate) fn current() -> Option<LevelId> {
    LEVEL_STACK.with(|stack| stack.borrow().last().copied())
}

/// Whether `id` is still on this thread's level stack.
pub(crate) fn is_live(id: LevelId) -> bool {
    LEVEL_STACK.with(|stack| stack.borrow().contains(&id))
}

/// Number of active levels on this thread.
pub fn depth() -> usize {
    LEVEL_STACK.with(|stack| stack.borrow().len())
}

/// RAII handle for an active differentiation level.
///
/// Dropping the guard detaches every tangent recorded under its level (and
/// under any level still nested above it) by popping the stack down past the
/// guard's id. This runs on every exit path, including `?` and panics.
#[derive(Debug)]
pub struct LevelGuard {
    id: LevelId,
    exited: bool,
}

impl LevelGuard {
    /// The level this guard controls.
    pub fn id(&self) -> LevelId {
        self.id
    }

    /// Explicitly exit the level, enforcing strict LIFO nesting.
    ///
    /// Returns [`AdError::MisnestedLevel`] if
    /// this level is live but not innermost; in that case nothing is popped —
    /// the caller is told rather than having inner levels silently torn down.
    /// Calling `exit` after the level is already gone is a no-op, so teardown
    /// is idempotent.
    pub fn exit(&mut self) -> Result<(), AdError> {
        if self.exited {
            return Ok(());
        }
        LEVEL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last() {
                Some(&top) if top == self.id => {
                    stack.pop();
                    self.exited = true;
                    Ok(())
                }
                _ if stack.contains(&self.id) => Err(AdError::MisnestedLevel(self.id.0)),
                // Already removed by an enclosing guard's teardown.
                _ => {
                    self.exited = true;
                    Ok(())
                }
            }
        })
    }
}

impl Drop for LevelGuard {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        LEVEL_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Pop this level and anything still nested above it.
            if let Some(pos) = stack.iter().position(|&l| l == self.id) {
                stack.truncate(pos);
            }
        });
        self.exited = true;
    }
}

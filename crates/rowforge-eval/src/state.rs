//! Per-row evaluation state.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::context::CompileContext;

/// Mutable state threaded through one row's evaluation.
///
/// A state borrows its compile context exclusively: variable slots live on
/// the context and `SetVariable` writes them through this borrow. Row
/// parallelism therefore means one cloned context (and one state) per
/// worker, never a shared one.
pub struct State<'a> {
    /// The current top-level row number, starting at 1.
    pub row_num: i64,
    /// The current derived-row number within the parent row, starting at 1.
    pub sub_row_num: i64,
    /// Deterministic PRNG consulted only by the random generators.
    pub rng: ChaCha8Rng,
    ctx: &'a mut CompileContext,
}

impl<'a> State<'a> {
    /// Create a state with a seeded PRNG. Equal seeds over an equal
    /// context yield identical rows.
    pub fn new(ctx: &'a mut CompileContext, seed: u64) -> Self {
        Self {
            row_num: 0,
            sub_row_num: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            ctx,
        }
    }

    /// Read access to the compile context.
    #[must_use]
    pub fn ctx(&self) -> &CompileContext {
        self.ctx
    }

    /// Write access to the compile context (variable slots, zone cache).
    pub fn ctx_mut(&mut self) -> &mut CompileContext {
        self.ctx
    }
}

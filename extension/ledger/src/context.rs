/// Position on the base ledger that a delta is applied at.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChainContext {
    pub height: u64,
}

impl ChainContext {
    pub fn at(height: u64) -> Self {
        Self { height }
    }

    /// The context of the following block.
    pub fn next(&self) -> Self {
        Self::at(self.height + 1)
    }
}

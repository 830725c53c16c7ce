use std::fmt::{Display, Formatter};

/// Identifier of an SSA value within a [`Module`](crate::modules::Module). Values are numbered densely in the order in
/// which they are created, across all functions of a module, and the identifier indexes into the module's value table.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    /// Creates a [`ValueId`] from its raw index.
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Raw index of this value in its module's value table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for ValueId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "%{}", self.0)
    }
}

//! Change flags carried by work nodes.

bitflags::bitflags! {
    /// Pending effects on a work node.
    ///
    /// `subtree_flags` of a node is the OR of every descendant's `flags`, so
    /// the commit walk can skip subtrees with nothing to do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct WorkFlags: u8 {
        const NONE = 0;
        /// Insert (or move) this node's host nodes into the host parent.
        const PLACEMENT = 1 << 0;
        /// Apply `pending_work` (a prop payload or new text) to the host handle.
        const UPDATE = 1 << 1;
        /// `deletions` holds children to remove.
        const CHILD_DELETION = 1 << 2;

        /// Everything the commit walk acts on.
        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits();
    }
}

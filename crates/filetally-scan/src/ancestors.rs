//! Identity of the directories on the current walk path.

use filetally_core::InodeInfo;

/// The (device, inode) identities of the directories currently open
/// between the root and the entry being visited.
///
/// A followed link that resolves to one of these is a loop back up the
/// tree. A link to a sibling or to some already finished directory is not,
/// and is walked like any other directory.
#[derive(Debug, Default)]
pub struct AncestorChain {
    open: Vec<InodeInfo>,
}

impl AncestorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a directory has been opened.
    pub fn push(&mut self, info: InodeInfo) {
        self.open.push(info);
    }

    /// Close the innermost open directory.
    pub fn pop(&mut self) -> Option<InodeInfo> {
        self.open.pop()
    }

    /// Whether `info` is one of the open directories.
    pub fn contains(&self, info: &InodeInfo) -> bool {
        self.open.contains(info)
    }

    /// Number of open directories.
    pub fn depth(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_pop() {
        let mut chain = AncestorChain::new();
        let root = InodeInfo::new(2, 1);
        let child = InodeInfo::new(3, 1);

        chain.push(root);
        chain.push(child);
        assert_eq!(chain.depth(), 2);
        assert!(chain.contains(&root));

        assert_eq!(chain.pop(), Some(child));
        assert!(!chain.contains(&child));
        assert!(chain.contains(&root));
    }

    #[test]
    fn test_finished_directory_is_forgotten() {
        let mut chain = AncestorChain::new();
        let shared = InodeInfo::new(7, 1);

        chain.push(shared);
        chain.pop();
        assert!(!chain.contains(&shared));
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn test_device_is_part_of_identity() {
        let mut chain = AncestorChain::new();
        chain.push(InodeInfo::new(12345, 1));
        assert!(!chain.contains(&InodeInfo::new(12345, 2)));
    }
}

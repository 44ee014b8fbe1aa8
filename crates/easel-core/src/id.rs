use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global interner for node identifiers.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Counter shared by every generated identifier, so prefixes never collide.
static NEXT_GENERATED: AtomicU64 = AtomicU64::new(1);

/// Reserved identifier of the scene root (the main layer).
pub const ROOT_ID: &str = "root";

/// Stable identifier of a node in the scene graph.
///
/// Interned: 4 bytes, `Copy`, and O(1) `Eq`/`Hash`. An id keeps pointing at the
/// same logical node across remove/restore cycles, which is what lets the
/// history and the selection hold ids instead of references.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern `s`, returning the existing id if it was seen before.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// The reserved root id.
    pub fn root() -> Self {
        Self::intern(ROOT_ID)
    }

    pub fn is_root(&self) -> bool {
        self.as_str() == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a fresh id such as `rect_12`.
    pub fn generate(prefix: &str) -> Self {
        let n = NEXT_GENERATED.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{prefix}_{n}"))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::intern(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_string_same_id() {
        let a = NodeId::intern("sticky");
        let b = NodeId::from("sticky");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "sticky");
    }

    #[test]
    fn generated_ids_are_unique_across_prefixes() {
        let a = NodeId::generate("rect");
        let b = NodeId::generate("rect");
        let c = NodeId::generate("text");
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(a.as_str().starts_with("rect_"));
    }

    #[test]
    fn root_is_reserved() {
        assert!(NodeId::root().is_root());
        assert!(!NodeId::intern("group").is_root());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = NodeId::intern("circle_7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"circle_7\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

//! Traversal policy for loading and creating object graphs.

use std::fmt;

/// How far a load or create follows child relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildDepth {
    /// Only the object itself; relations stay unloaded
    #[default]
    Single,
    /// Create mandatory, composed children only
    Required,
    /// Load relations as proxies (load_relation only)
    ProxiesOnly,
    /// Follow child relations without limit
    Infinite,
    /// Follow child relations for this many generations
    Depth(u32),
}

impl BuildDepth {
    /// Nesting level at which create stops constructing children.
    pub const MAX: u32 = 10;

    /// The depth to use for the next generation.
    pub fn next(self) -> Self {
        match self {
            BuildDepth::Depth(n) => BuildDepth::Depth(n.saturating_sub(1)),
            BuildDepth::ProxiesOnly => BuildDepth::Single,
            other => other,
        }
    }

    /// Whether relations are resolved eagerly at this depth.
    pub fn is_eager(self) -> bool {
        match self {
            BuildDepth::Infinite => true,
            BuildDepth::Depth(n) => n > 0,
            _ => false,
        }
    }
}

impl fmt::Display for BuildDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildDepth::Single => write!(f, "SINGLE"),
            BuildDepth::Required => write!(f, "REQUIRED"),
            BuildDepth::ProxiesOnly => write!(f, "PROXIES_ONLY"),
            BuildDepth::Infinite => write!(f, "INFINITE"),
            BuildDepth::Depth(n) => write!(f, "{}", n),
        }
    }
}

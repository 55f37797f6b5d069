//! VNode tree - nodes, the owning arena, and structural paths.
//!
//! - [`node`]: `VNode`, the closed `VNodeKind` set, lifecycle phases
//! - [`tree`]: slab arena with index reuse; owns every node
//! - [`path`]: stable structural identity used by diffing and hook lookup

pub mod node;
pub mod path;
pub mod tree;

pub use node::{Key, NodeBody, NodeFlags, Phase, VNode, VNodeKind};
pub use path::{mark_path, mark_root_path, mark_subtree_paths, path_key, path_segments, PathSeg};
pub use tree::{NodeId, VNodeTree};

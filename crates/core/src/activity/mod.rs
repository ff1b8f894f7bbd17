mod tree;
pub use tree::ActivityTree;

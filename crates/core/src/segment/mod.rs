mod segmenter;
pub use segmenter::Segmenter;

mod linking;
pub(crate) use linking::link_related_segments;

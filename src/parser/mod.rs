pub mod headings;
pub mod paged;
pub mod segment;

pub use segment::Segmenter;

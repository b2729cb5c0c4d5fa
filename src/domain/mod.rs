pub mod listing;
pub mod parse;
pub mod submission;
pub mod submitter;

pub use submitter::Submitter;

pub mod archive;
pub mod document;

pub mod esri;
pub mod rings;

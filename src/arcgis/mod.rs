pub mod client;
pub mod feature;
pub mod intersect;
pub mod parcel;
#[cfg(test)]
pub mod testing;

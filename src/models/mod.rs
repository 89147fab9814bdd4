pub mod collection;
pub mod mint;

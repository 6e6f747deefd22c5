pub mod esp32;
mod error;
pub mod extract;
pub mod manifest;
pub mod merge;
#[cfg(test)]
mod test_util;

pub use error::Error;

pub use esp32::ComponentSet;

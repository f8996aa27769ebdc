pub mod index;
pub mod stub;
pub mod util;

pub use index::*;
pub use stub::*;

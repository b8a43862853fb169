mod cache;
mod catalog;
mod memory;
mod traits;

pub use cache::*;
pub use catalog::*;
pub use memory::*;
pub use traits::*;

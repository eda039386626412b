mod bits;
mod resolver;

pub use bits::*;
pub use resolver::*;

pub mod selection;
pub mod clustering;
pub mod hull;
pub mod simplification;

pub use selection::*;
pub use clustering::*;
pub use hull::*;
pub use simplification::*;

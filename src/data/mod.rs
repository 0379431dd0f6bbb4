use super::*;

mod dataset;
pub use dataset::*;

mod text_gen;
pub use text_gen::*;

mod train;
pub use train::*;

pub mod info;
pub mod lookup;
pub mod tables;
pub mod util;

pub use info::*;
pub use lookup::*;
pub use tables::*;
pub use util::*;

pub mod reflective;
pub mod syntactic;

pub use reflective::*;
pub use syntactic::*;

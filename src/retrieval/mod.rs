pub mod adaptive;
pub mod chunks;
pub mod keyword;
pub mod quality;

pub use adaptive::*;
pub use chunks::*;
pub use keyword::*;
pub use quality::*;

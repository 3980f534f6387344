pub mod context;
pub mod hallucination;
pub mod schema_check;
pub mod semantic;
pub mod sql_text;
pub mod syntax;

pub use context::*;
pub use hallucination::*;
pub use schema_check::*;
pub use semantic::*;
pub use syntax::*;

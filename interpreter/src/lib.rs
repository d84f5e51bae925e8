use lalrpop_util::lalrpop_mod;

pub mod runner;
pub mod script;

lalrpop_mod!(grammar, "/grammar.rs");

pub use runner::Runner;
pub use script::{Addr, Command, ErrorKind, Line, ScriptError, parse};

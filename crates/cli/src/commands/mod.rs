mod build;
mod eval;
mod parse;
mod validate;

pub(crate) use build::cmd_build;
pub(crate) use eval::cmd_eval;
pub(crate) use parse::{cmd_parse, ObjectDecl};
pub(crate) use validate::cmd_validate;

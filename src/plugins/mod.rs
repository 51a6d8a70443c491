//! Validators joined by the union in `core::validate`.
//!
//! Each plugin is one independently scoped scan. Registration lives in
//! `subsystems`.

pub mod ast;
pub mod security;
pub mod structure;
pub mod test_contract;

//! Validator registration. Every scan the validator union runs is listed here.
//!
//! Adding a new validator: append one entry to `VALIDATORS`. Its rule ids
//! join the closed vocabulary in `core::violation::rules`.

use crate::core::validate::Validator;
use crate::plugins::{ast, security, structure, test_contract};

/// All validators in the union, in registration order. Order does not affect
/// output; the union sorts globally.
pub(crate) const VALIDATORS: &[&dyn Validator] = &[
    &structure::StructureValidator,
    &ast::AstPatternValidator,
    &security::SecurityBaselineValidator,
    &test_contract::TestContractValidator,
];

pub fn validators() -> Vec<&'static dyn Validator> {
    VALIDATORS.to_vec()
}

pub fn validator_ids() -> Vec<&'static str> {
    VALIDATORS.iter().map(|v| v.id()).collect()
}

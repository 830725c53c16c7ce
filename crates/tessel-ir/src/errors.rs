use thiserror::Error;

use crate::values::ValueId;

#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum IrError {
    #[error("value {value} does not exist in this module")]
    UnknownValue { value: ValueId },

    #[error("value {value} is expected to be a {expected} value")]
    UnexpectedValueType { value: ValueId, expected: &'static str },

    #[error("operation '{operation}' in function '{function}' uses value {value} before it is defined")]
    UseBeforeDefinition { function: String, operation: String, value: ValueId },

    #[error("value {value} is defined more than once in function '{function}'")]
    MultipleDefinitions { function: String, value: ValueId },

    #[error("value {value} is defined in function '{function}', but function '{other}' already defines it")]
    DefinedInOtherFunction { function: String, other: String, value: ValueId },

    #[error("function '{function}' returns value {value}, which it does not define")]
    UndefinedReturnValue { function: String, value: ValueId },

    #[error("operation '{operation}' writes into {destination}, whose type differs from the type of result {result}")]
    DestinationTypeMismatch { operation: String, destination: ValueId, result: ValueId },

    #[error("module already contains a function named '{name}'")]
    DuplicateFunction { name: String },
}

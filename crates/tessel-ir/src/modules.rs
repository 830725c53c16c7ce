//! Modules and functions of device programs.
//!
//! A [`Module`] owns the type of every value used by its functions, the [`SystemDesc`] it was compiled for, and the
//! [`DeviceAttr`] of its target device. Functions are constructed through a [`FunctionBuilder`], which verifies the
//! function when it is finished so that every [`Function`] stored in a module is well-formed: every value is defined
//! exactly once in the whole module, before its first use, and destination-passing results have the type of the
//! buffer they alias.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use crate::attributes::{DeviceAttr, Location, SystemDesc};
use crate::errors::IrError;
use crate::operations::{Operation, OperationInterface};
use crate::types::{DeviceType, TensorType, ValueType};
use crate::values::ValueId;

/// [`Operation`] together with the source location it was derived from.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub operation: Operation,
    pub location: Location,
}

/// Function of a device program: a straight-line sequence of [`Instruction`]s over SSA values.
#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    name: String,
    arguments: Vec<ValueId>,
    body: Vec<Instruction>,
    returns: Vec<ValueId>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[ValueId] {
        &self.arguments
    }

    /// Instructions of this function, in program order.
    pub fn body(&self) -> &[Instruction] {
        &self.body
    }

    pub fn returns(&self) -> &[ValueId] {
        &self.returns
    }
}

/// Top-level container of device-program functions.
#[derive(Clone, Debug, PartialEq)]
pub struct Module {
    system_desc: SystemDesc,
    device: DeviceAttr,
    value_types: Vec<ValueType>,
    functions: Vec<Function>,

    /// Name of the function that defines each value, for every value defined by a function of this module.
    definitions: HashMap<ValueId, String>,
}

impl Module {
    /// Creates an empty [`Module`] targeting the provided system and device.
    pub fn new(system_desc: SystemDesc, device: DeviceAttr) -> Self {
        Self { system_desc, device, value_types: Vec::new(), functions: Vec::new(), definitions: HashMap::new() }
    }

    pub fn system_desc(&self) -> &SystemDesc {
        &self.system_desc
    }

    pub fn device(&self) -> &DeviceAttr {
        &self.device
    }

    /// Functions of this module, in the order in which they were added.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Returns the function with the provided name, if one exists.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
    }

    /// Registers a new value of the provided type and returns its identifier. The value still needs to be defined by
    /// a function argument or an operation result before it can be used.
    pub fn add_value<T: Into<ValueType>>(&mut self, value_type: T) -> ValueId {
        self.value_types.push(value_type.into());
        ValueId((self.value_types.len() - 1) as u32)
    }

    /// Number of values registered in this module.
    pub fn value_count(&self) -> usize {
        self.value_types.len()
    }

    pub fn value_type(&self, value: ValueId) -> Result<&ValueType, IrError> {
        self.value_types.get(value.index()).ok_or(IrError::UnknownValue { value })
    }

    /// Returns the [`TensorType`] of the provided value, failing if it is not a tensor.
    pub fn tensor_type(&self, value: ValueId) -> Result<&TensorType, IrError> {
        self.value_type(value)?.as_tensor().ok_or(IrError::UnexpectedValueType { value, expected: "tensor" })
    }

    /// Returns the [`DeviceType`] of the provided value, failing if it is not a device.
    pub fn device_type(&self, value: ValueId) -> Result<&DeviceType, IrError> {
        self.value_type(value)?.as_device().ok_or(IrError::UnexpectedValueType { value, expected: "device" })
    }

    /// Starts building a new function in this module.
    pub fn function_builder<N: Into<String>>(&mut self, name: N) -> FunctionBuilder<'_> {
        FunctionBuilder { module: self, name: name.into(), arguments: Vec::new(), body: Vec::new() }
    }

    fn verify_function(&self, function: &Function) -> Result<(), IrError> {
        let mut defined = HashSet::new();
        let define = |value: ValueId, defined: &mut HashSet<ValueId>| -> Result<(), IrError> {
            self.value_type(value)?;
            if let Some(other) = self.definitions.get(&value) {
                return Err(IrError::DefinedInOtherFunction {
                    function: function.name.clone(),
                    other: other.clone(),
                    value,
                });
            }
            if defined.insert(value) {
                Ok(())
            } else {
                Err(IrError::MultipleDefinitions { function: function.name.clone(), value })
            }
        };

        for &argument in &function.arguments {
            define(argument, &mut defined)?;
        }

        for instruction in &function.body {
            let operation = &instruction.operation;
            for operand in operation.operands() {
                self.value_type(operand)?;
                if !defined.contains(&operand) {
                    return Err(IrError::UseBeforeDefinition {
                        function: function.name.clone(),
                        operation: operation.name().to_string(),
                        value: operand,
                    });
                }
            }

            let results = operation.results();
            for &result in &results {
                define(result, &mut defined)?;
            }

            if let Operation::GetDevice(op) = operation {
                self.device_type(op.result)?;
            }

            if let (Some(destination), [result]) = (operation.destination(), results.as_slice()) {
                if self.value_type(destination)? != self.value_type(*result)? {
                    return Err(IrError::DestinationTypeMismatch {
                        operation: operation.name().to_string(),
                        destination,
                        result: *result,
                    });
                }
            }
        }

        for &value in &function.returns {
            if !defined.contains(&value) {
                return Err(IrError::UndefinedReturnValue { function: function.name.clone(), value });
            }
        }

        Ok(())
    }

    /// Returns a [`Display`] adapter that renders one instruction of this module the way it appears when printing the
    /// whole module (e.g., `%4 = ttnn.relu(%2, %3) : tensor<...> loc("relu_1")`).
    pub fn display_instruction<'a>(&'a self, instruction: &'a Instruction) -> InstructionDisplay<'a> {
        InstructionDisplay { module: self, instruction }
    }

    fn write_value_types(&self, formatter: &mut Formatter<'_>, values: &[ValueId]) -> std::fmt::Result {
        for (index, value) in values.iter().enumerate() {
            if index > 0 {
                write!(formatter, ", ")?;
            }
            match self.value_types.get(value.index()) {
                Some(value_type) => write!(formatter, "{value_type}")?,
                None => write!(formatter, "<unknown>")?,
            }
        }
        Ok(())
    }
}

impl Display for Module {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(formatter, "module attributes {{system_desc = {}, device = {}}} {{", self.system_desc, self.device)?;
        for function in &self.functions {
            write!(formatter, "  func.func @{}(", function.name)?;
            for (index, argument) in function.arguments.iter().enumerate() {
                if index > 0 {
                    write!(formatter, ", ")?;
                }
                write!(formatter, "{argument}: ")?;
                self.write_value_types(formatter, std::slice::from_ref(argument))?;
            }
            write!(formatter, ") -> (")?;
            self.write_value_types(formatter, &function.returns)?;
            writeln!(formatter, ") {{")?;

            for instruction in &function.body {
                writeln!(formatter, "    {}", self.display_instruction(instruction))?;
            }

            let returns = function.returns.iter().map(|r| r.to_string()).collect::<Vec<_>>();
            write!(formatter, "    return {}", returns.join(", "))?;
            if !function.returns.is_empty() {
                write!(formatter, " : ")?;
                self.write_value_types(formatter, &function.returns)?;
            }
            writeln!(formatter)?;
            writeln!(formatter, "  }}")?;
        }
        write!(formatter, "}}")
    }
}

/// [`Display`] adapter returned by [`Module::display_instruction`].
pub struct InstructionDisplay<'a> {
    module: &'a Module,
    instruction: &'a Instruction,
}

impl Display for InstructionDisplay<'_> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let operation = &self.instruction.operation;
        let results = operation.results();
        if !results.is_empty() {
            let names = results.iter().map(|r| r.to_string()).collect::<Vec<_>>();
            write!(formatter, "{} = ", names.join(", "))?;
        }
        let operands = operation.operands().iter().map(|o| o.to_string()).collect::<Vec<_>>();
        write!(formatter, "{}({})", operation.name(), operands.join(", "))?;
        let attributes = operation.attributes();
        if !attributes.is_empty() {
            let attributes = attributes.iter().map(|(name, value)| format!("{name} = {value}")).collect::<Vec<_>>();
            write!(formatter, " {{{}}}", attributes.join(", "))?;
        }
        if !results.is_empty() {
            write!(formatter, " : ")?;
            self.module.write_value_types(formatter, &results)?;
        }
        write!(formatter, " {}", self.instruction.location)
    }
}

/// Incrementally constructs a [`Function`] inside a [`Module`].
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    name: String,
    arguments: Vec<ValueId>,
    body: Vec<Instruction>,
}

impl FunctionBuilder<'_> {
    /// Adds a new argument of the provided type to the function.
    pub fn argument<T: Into<ValueType>>(&mut self, value_type: T) -> ValueId {
        let value = self.module.add_value(value_type);
        self.arguments.push(value);
        value
    }

    /// Registers a new value of the provided type, to be defined by an operation appended later.
    pub fn value<T: Into<ValueType>>(&mut self, value_type: T) -> ValueId {
        self.module.add_value(value_type)
    }

    /// Appends an operation without a known source location.
    pub fn append<O: Into<Operation>>(&mut self, operation: O) -> &mut Self {
        self.append_at(operation, Location::Unknown)
    }

    /// Appends an operation derived from the provided source location.
    pub fn append_at<O: Into<Operation>>(&mut self, operation: O, location: Location) -> &mut Self {
        self.body.push(Instruction { operation: operation.into(), location });
        self
    }

    /// Verifies the function and adds it to the module.
    pub fn finish(self, returns: Vec<ValueId>) -> Result<(), IrError> {
        if self.module.function(&self.name).is_some() {
            return Err(IrError::DuplicateFunction { name: self.name });
        }
        let function = Function { name: self.name, arguments: self.arguments, body: self.body, returns };
        self.module.verify_function(&function)?;
        log::debug!("built function '{}' with {} operation(s)", function.name, function.body.len());
        let results = function.body.iter().flat_map(|instruction| instruction.operation.results());
        for value in function.arguments.iter().copied().chain(results) {
            self.module.definitions.insert(value, function.name.clone());
        }
        self.module.functions.push(function);
        Ok(())
    }
}

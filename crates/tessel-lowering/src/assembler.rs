//! Assembly of complete binaries from modules.
//!
//! [`lower_module`] lowers every function of a module into a [`Program`], in order, sharing a single [`ObjectCache`]
//! across all of them so that records are interned per binary. The resulting [`Binary`] is framed and then verified
//! before it is returned, so callers never observe a buffer that the runtime would reject.

use std::collections::HashMap;

use tessel_ir::{DeviceType, Function, MemoryConfigAttr, Module, ValueId, ValueType};
use tessel_schema::{
    Binary, DebugInfo, DeviceRef, GoldenInfo, GoldenKv, MemoryConfigDesc, MlirSnapshot, Operation, Program, TensorRef,
    finish_size_prefixed, verify_size_prefixed,
};

use crate::cache::{ObjectCache, ObjectKey};
use crate::descriptors::{device_ref, memory_config_desc, system_desc, tensor_ref};
use crate::errors::LoweringError;
use crate::operations::encode_operation;
use crate::options::LoweringOptions;

/// Address and size recorded for tensors that the runtime allocates itself.
const HOST_ALLOCATED_ADDRESS: u64 = 0;
const HOST_ALLOCATED_SIZE: u64 = 0;

/// State of one lowering run: the module being lowered, the records built so far, and the destination-passing aliases
/// between operation results and the init operands they write into. Aliases are scoped to the function being lowered.
pub struct LoweringContext<'m> {
    module: &'m Module,
    cache: ObjectCache,
    aliases: HashMap<ValueId, ValueId>,
}

impl<'m> LoweringContext<'m> {
    pub fn new(module: &'m Module) -> Self {
        Self { module, cache: ObjectCache::new(), aliases: HashMap::new() }
    }

    pub fn module(&self) -> &'m Module {
        self.module
    }

    pub fn cache(&mut self) -> &mut ObjectCache {
        &mut self.cache
    }

    /// Returns the value whose buffer `value` lives in, following destination-passing results back to the init
    /// operands they alias.
    pub fn resolve(&self, mut value: ValueId) -> ValueId {
        while let Some(&destination) = self.aliases.get(&value) {
            value = destination;
        }
        value
    }

    /// Returns the handle of the tensor that `value` refers to. The tensor must have been built already, either as a
    /// function argument or as the result of an earlier operation.
    pub fn input(&self, value: ValueId) -> Result<u32, LoweringError> {
        Ok(self.cache.at::<TensorRef>(&ObjectKey::Value(self.resolve(value)))?.index())
    }

    pub fn inputs(&self, values: &[ValueId]) -> Result<Vec<u32>, LoweringError> {
        values.iter().map(|&value| self.input(value)).collect()
    }

    pub fn optional_input(&self, value: Option<ValueId>) -> Result<Option<u32>, LoweringError> {
        value.map(|value| self.input(value)).transpose()
    }

    /// Builds the tensor for a value that the runtime allocates (e.g., a function argument or the result of an
    /// operation that does not write into a destination operand) and returns its handle.
    pub fn output(&mut self, value: ValueId) -> Result<u32, LoweringError> {
        let tensor_type = self.module.tensor_type(value)?;
        let worker_grid = self.module.device().worker_grid;
        let handle = self.cache.get_or_create(ObjectKey::Value(value), |cache| {
            tensor_ref(cache, tensor_type, worker_grid, HOST_ALLOCATED_ADDRESS, HOST_ALLOCATED_SIZE)
        })?;
        Ok(handle.index())
    }

    /// Records that `result` aliases the buffer of the init operand `destination` and returns the handle of that
    /// buffer.
    pub fn destination(&mut self, destination: ValueId, result: ValueId) -> Result<u32, LoweringError> {
        if result != destination {
            self.aliases.insert(result, destination);
        }
        self.input(result)
    }

    /// Builds the device for a value that is opened by the program and returns its handle.
    pub fn create_device(&mut self, value: ValueId) -> Result<u32, LoweringError> {
        let device_type = self.module.device_type(value)?;
        let handle = self.cache.get_or_create(ObjectKey::Value(value), |_| device_ref(device_type))?;
        Ok(handle.index())
    }

    /// Returns the handle of a device that was opened by an earlier operation.
    pub fn device(&self, value: ValueId) -> Result<u32, LoweringError> {
        Ok(self.cache.at::<DeviceRef>(&ObjectKey::Value(self.resolve(value)))?.index())
    }

    pub fn optional_device(&self, value: Option<ValueId>) -> Result<Option<u32>, LoweringError> {
        value.map(|value| self.device(value)).transpose()
    }

    /// Returns the type of the device that `value` refers to, if any.
    pub fn device_type(&self, value: Option<ValueId>) -> Result<Option<&'m DeviceType>, LoweringError> {
        Ok(value.map(|value| self.module.device_type(value)).transpose()?)
    }

    pub fn memory_config(&mut self, memory_config: &MemoryConfigAttr) -> Result<u32, LoweringError> {
        let handle = self.cache.get_or_create::<MemoryConfigDesc, _>(
            ObjectKey::MemoryConfig(memory_config.clone()),
            |cache| memory_config_desc(cache, memory_config),
        )?;
        Ok(handle.index())
    }

    pub fn optional_memory_config(
        &mut self,
        memory_config: Option<&MemoryConfigAttr>,
    ) -> Result<Option<u32>, LoweringError> {
        memory_config.map(|memory_config| self.memory_config(memory_config)).transpose()
    }

    /// Consumes this context and returns the tables of all records built through it.
    pub fn finish(self) -> tessel_schema::ObjectTable {
        self.cache.finish()
    }
}

fn debug_bundle(module: &Module, options: &LoweringOptions) -> DebugInfo {
    DebugInfo {
        mlir: Some(MlirSnapshot { name: "ttnn".to_string(), source: module.to_string() }),
        cpp: options.generated_source.clone().unwrap_or_default(),
        module_cache: options
            .pass_snapshots
            .iter()
            .map(|(pass, source)| MlirSnapshot { name: pass.clone(), source: source.clone() })
            .collect(),
        golden_info: Some(GoldenInfo {
            golden_map: options
                .golden_tensors
                .iter()
                .map(|(name, tensor)| GoldenKv { key: name.clone(), value: Some(tensor.to_record()) })
                .collect(),
        }),
    }
}

/// Lowers one function into a [`Program`]. Arguments become the program inputs, every instruction becomes one
/// operation record (in program order), and the returned values, resolved through destination-passing aliases,
/// become the program outputs.
pub fn lower_function(
    ctx: &mut LoweringContext<'_>,
    function: &Function,
    debug_info: u32,
) -> Result<Program, LoweringError> {
    log::debug!("lowering function '{}' with {} operation(s)", function.name(), function.body().len());
    ctx.aliases.clear();
    let module = ctx.module();

    let mut inputs = Vec::with_capacity(function.arguments().len());
    for &argument in function.arguments() {
        match module.value_type(argument)? {
            ValueType::Device(_) => {
                ctx.create_device(argument)?;
            }
            ValueType::Tensor(_) => inputs.push(ctx.output(argument)?),
        }
    }

    let mut operations = Vec::with_capacity(function.body().len());
    for instruction in function.body() {
        let op_type = encode_operation(ctx, &instruction.operation)?;
        log::trace!("encoded '{}' as a '{}' record", instruction.operation.interface().name(), op_type.name());
        operations.push(Operation {
            op_type: Some(op_type),
            debug_info: module.display_instruction(instruction).to_string(),
            loc_info: instruction.location.to_string(),
        });
    }

    let outputs = ctx.inputs(function.returns())?;
    Ok(Program { name: function.name().to_string(), inputs, outputs, operations, debug_info })
}

/// Lowers `module` into a size-prefixed binary.
///
/// The binary contains one program per function of the module, the system description of the module, and a debug
/// bundle with the textual form of the module and the optional debug information of `options`. The binary is verified
/// after it has been framed, and a binary that fails verification is never returned.
pub fn lower_module(module: &Module, options: &LoweringOptions) -> Result<Vec<u8>, LoweringError> {
    log::info!("lowering module with {} function(s)", module.functions().len());
    let mut ctx = LoweringContext::new(module);
    let debug_info = ctx.cache().get_or_create(ObjectKey::DebugInfo, |_| Ok(debug_bundle(module, options)))?.index();
    let programs = module
        .functions()
        .iter()
        .map(|function| lower_function(&mut ctx, function, debug_info))
        .collect::<Result<Vec<_>, _>>()?;

    let binary = Binary {
        version: Some(options.version.clone()),
        build_identity: options.build_identity.clone(),
        system_desc: Some(system_desc(module.system_desc())?),
        objects: Some(ctx.finish()),
        programs,
    };
    let buffer = finish_size_prefixed(&binary)?;
    verify_size_prefixed(&buffer)?;
    log::info!("lowered module into a binary of {} byte(s)", buffer.len());
    Ok(buffer)
}

//! Running LLVM modules using a JIT execution engine.
use crate::config::Config;
use crate::error::Error;
use crate::value::{GenericValue, Kind, TypedValue};
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;
use inkwell::support::LLVMString;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::types::{AnyType, AsTypeRef, BasicTypeEnum};
use inkwell::values::FunctionValue;
use llvm_sys_170::core::LLVMGetTypeKind;
use llvm_sys_170::LLVMTypeKind;
use log::debug;
use std::ffi::c_void;
use std::path::Path;
use std::sync::OnceLock;

static NATIVE_TARGET: OnceLock<Result<(), String>> = OnceLock::new();

fn llvm_error(error: LLVMString) -> String {
    error.to_string_lossy().into_owned()
}

fn initialize_native_target() -> Result<(), Error> {
    NATIVE_TARGET
        .get_or_init(|| {
            Target::initialize_native(&InitializationConfig::default())
        })
        .clone()
        .map_err(Error::Engine)
}

/// Parses a module from a file containing textual LLVM IR.
pub fn load_ir<'ctx>(
    context: &'ctx Context,
    path: &Path,
) -> Result<Module<'ctx>, Error> {
    let buffer = MemoryBuffer::create_from_file(path)
        .map_err(|err| Error::InvalidIr(llvm_error(err)))?;

    context
        .create_module_from_ir(buffer)
        .map_err(|err| Error::InvalidIr(llvm_error(err)))
}

/// A JIT execution engine for a single module.
///
/// Values returned by functions may point into memory owned by the engine
/// (e.g. global strings), so the values produced by `Engine::run` can't
/// outlive the engine.
pub struct Engine<'ctx> {
    module: Module<'ctx>,
    engine: ExecutionEngine<'ctx>,
}

impl<'ctx> Engine<'ctx> {
    pub fn new(
        module: Module<'ctx>,
        config: &Config,
    ) -> Result<Engine<'ctx>, Error> {
        initialize_native_target()?;

        let engine = module
            .create_jit_execution_engine(config.optimization_level())
            .map_err(|err| Error::Engine(llvm_error(err)))?;

        Ok(Engine { module, engine })
    }

    /// Returns the kind of value the function returns, based on its declared
    /// return type.
    ///
    /// Pointers are always reported as `Kind::Pointer`, as the IR doesn't
    /// tell us if a pointer points to a boxed string.
    pub fn kind_of(&self, name: &str) -> Result<Kind, Error> {
        let func = self.function(name)?;

        match func.get_type().get_return_type() {
            Some(BasicTypeEnum::IntType(_)) => Ok(Kind::Int),
            Some(BasicTypeEnum::PointerType(_)) => Ok(Kind::Pointer),
            Some(BasicTypeEnum::FloatType(typ)) => {
                match unsafe { LLVMGetTypeKind(typ.as_type_ref()) } {
                    LLVMTypeKind::LLVMDoubleTypeKind => Ok(Kind::Double),
                    LLVMTypeKind::LLVMFloatTypeKind => Ok(Kind::Float),
                    _ => Err(unsupported(typ)),
                }
            }
            Some(typ) => Err(unsupported(typ)),
            None => Err(Error::UnsupportedType("void".to_string())),
        }
    }

    /// Runs a function that takes no arguments, returning its result as a
    /// value of the given kind.
    ///
    /// The kind must be compatible with the function's return type. Asking
    /// for `Kind::String` is allowed for functions returning a pointer, in
    /// which case the pointer must point to a boxed string.
    ///
    /// This runs arbitrary native code, which is why this method is unsafe.
    pub unsafe fn run(
        &self,
        name: &str,
        kind: Kind,
    ) -> Result<TypedValue<'_>, Error> {
        let func = self.function(name)?;

        if func.count_params() > 0 {
            return Err(unsupported(func.get_type()));
        }

        let declared = self.kind_of(name)?;

        match (declared, kind) {
            (a, b) if a == b => {}
            (Kind::Pointer, Kind::String) => {}
            (found, expected) => {
                return Err(Error::WrongKind { expected, found })
            }
        }

        debug!("running function '{}' as {}", name, kind);

        let value = match kind {
            Kind::Double => TypedValue::of_f64(self.call::<f64>(name)?),
            Kind::Float => TypedValue::of_f32(self.call::<f32>(name)?),
            Kind::Int => self.run_int(func, name)?,
            Kind::Pointer => {
                TypedValue::of_pointer(self.call::<*mut c_void>(name)?)
            }
            Kind::String => {
                let ptr = self.call::<*mut c_void>(name)?;

                TypedValue::new(GenericValue::of_pointer(ptr), Kind::String)
            }
        };

        Ok(value)
    }

    unsafe fn run_int(
        &self,
        func: FunctionValue<'ctx>,
        name: &str,
    ) -> Result<TypedValue<'_>, Error> {
        let typ = match func.get_type().get_return_type() {
            Some(BasicTypeEnum::IntType(typ)) => typ,
            Some(typ) => return Err(unsupported(typ)),
            None => return Err(Error::UnsupportedType("void".to_string())),
        };

        // The native return type must match the width exactly, otherwise we
        // may read garbage from the upper bits of the return register. For
        // `i1` only the lowest bit is defined, so it's read as a byte and
        // masked instead of being read as a `bool`.
        let value = match typ.get_bit_width() {
            1 => (self.call::<u8>(name)? & 1) as u64,
            8 => self.call::<u8>(name)? as u64,
            16 => self.call::<u16>(name)? as u64,
            32 => self.call::<u32>(name)? as u64,
            64 => self.call::<u64>(name)?,
            _ => return Err(unsupported(typ)),
        };

        Ok(TypedValue::of_int(typ.get_bit_width(), value, false))
    }

    unsafe fn call<T>(&self, name: &str) -> Result<T, Error> {
        let func = self
            .engine
            .get_function::<unsafe extern "C" fn() -> T>(name)
            .map_err(|err| Error::Engine(format!("{:?}", err)))?;

        Ok(func.call())
    }

    fn function(&self, name: &str) -> Result<FunctionValue<'ctx>, Error> {
        debug!("looking up function '{}'", name);
        self.module
            .get_function(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }
}

fn unsupported<'ctx>(typ: impl AnyType<'ctx>) -> Error {
    Error::UnsupportedType(llvm_error(typ.print_to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::STRING_DATA_OFFSET;
    use crate::test::{
        double_module, float_module, int_module, ir_file, string_module,
        void_module,
    };
    use similar_asserts::assert_eq;
    use std::fs::remove_file;

    fn engine<'ctx>(module: Module<'ctx>) -> Engine<'ctx> {
        Engine::new(module, &Config::new()).unwrap()
    }

    #[test]
    fn test_load_ir() {
        let path = ir_file(
            "load_ir",
            "@string = constant { i32, [6 x i8] } { i32 5, [6 x i8] c\"hello\\00\" }

define ptr @main() {
  ret ptr @string
}
",
        );
        let ctx = Context::create();
        let module = load_ir(&ctx, &path);

        remove_file(&path).unwrap();

        let engine = engine(module.unwrap());
        let value = unsafe { engine.run("main", Kind::String) }.unwrap();

        assert_eq!(value.string(), Ok("hello".to_string()));
    }

    #[test]
    fn test_load_ir_with_invalid_ir() {
        let path = ir_file("invalid_ir", "define ptr @main( {\n");
        let ctx = Context::create();
        let result = load_ir(&ctx, &path);

        remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::InvalidIr(_))));
    }

    #[test]
    fn test_load_ir_with_missing_file() {
        let ctx = Context::create();
        let path = std::env::temp_dir().join("jit-test-does-not-exist.ll");

        assert!(matches!(load_ir(&ctx, &path), Err(Error::InvalidIr(_))));
    }

    #[test]
    fn test_run_function_with_parameters() {
        let path = ir_file(
            "parameters",
            "define double @main(double %a) {
  ret double %a
}
",
        );
        let ctx = Context::create();
        let module = load_ir(&ctx, &path);

        remove_file(&path).unwrap();

        let engine = engine(module.unwrap());
        let result = unsafe { engine.run("main", Kind::Double) };

        assert!(matches!(result, Err(Error::UnsupportedType(_))));
    }

    #[test]
    fn test_run_bool() {
        let ctx = Context::create();
        let engine = engine(int_module(&ctx, "main", 1, 1));
        let value = unsafe { engine.run("main", Kind::Int) }.unwrap();

        assert_eq!(value.int(false), Ok(1));
        assert_eq!(value.view().int_width(), 1);
    }

    #[test]
    fn test_run_truncated_bool() {
        let path = ir_file(
            "truncated_bool",
            "define i1 @main() {
  %a = add i8 0, 254
  %b = trunc i8 %a to i1
  ret i1 %b
}
",
        );
        let ctx = Context::create();
        let module = load_ir(&ctx, &path);

        remove_file(&path).unwrap();

        let engine = engine(module.unwrap());
        let value = unsafe { engine.run("main", Kind::Int) }.unwrap();

        assert_eq!(value.int(false), Ok(0));
    }

    #[test]
    fn test_run_string() {
        let ctx = Context::create();
        let engine = engine(string_module(&ctx, "main", "hello"));
        let value = unsafe { engine.run("main", Kind::String) }.unwrap();

        assert_eq!(value.kind(), Kind::String);
        assert_eq!(value.string(), Ok("hello".to_string()));
        assert_eq!(unsafe { value.view().read_string() }, "hello");
    }

    #[test]
    fn test_run_string_matches_the_boxed_string_layout() {
        let ctx = Context::create();
        let engine = engine(string_module(&ctx, "main", "ab"));
        let value = unsafe { engine.run("main", Kind::String) }.unwrap();
        let object = value.pointer().unwrap() as *const u8;
        let bytes = unsafe { std::slice::from_raw_parts(object, 7) };

        assert_eq!(&bytes[0..STRING_DATA_OFFSET], &2_i32.to_ne_bytes());
        assert_eq!(&bytes[STRING_DATA_OFFSET..], &[97_u8, 98, 0]);
    }

    #[test]
    fn test_run_string_empty() {
        let ctx = Context::create();
        let engine = engine(string_module(&ctx, "main", ""));
        let value = unsafe { engine.run("main", Kind::String) }.unwrap();

        assert_eq!(value.string(), Ok(String::new()));
    }

    #[test]
    fn test_run_pointer() {
        let ctx = Context::create();
        let engine = engine(string_module(&ctx, "main", "hello"));
        let value = unsafe { engine.run("main", Kind::Pointer) }.unwrap();

        assert_eq!(value.kind(), Kind::Pointer);
        assert!(!value.pointer().unwrap().is_null());
        assert_eq!(
            value.string(),
            Err(Error::WrongKind {
                expected: Kind::String,
                found: Kind::Pointer
            })
        );
    }

    #[test]
    fn test_run_double() {
        let ctx = Context::create();
        let engine = engine(double_module(&ctx, "main", 3.5));
        let value = unsafe { engine.run("main", Kind::Double) }.unwrap();

        assert_eq!(value.double(), Ok(3.5));
        assert_eq!(value.view().to_f64(), 3.5);
    }

    #[test]
    fn test_run_double_negative_zero() {
        let ctx = Context::create();
        let engine = engine(double_module(&ctx, "main", -0.0));
        let value = unsafe { engine.run("main", Kind::Double) }.unwrap();

        assert!(value.view().to_f64().is_sign_negative());
    }

    #[test]
    fn test_run_float() {
        let ctx = Context::create();
        let engine = engine(float_module(&ctx, "main", 1.5));
        let value = unsafe { engine.run("main", Kind::Float) }.unwrap();

        assert_eq!(value.kind(), Kind::Float);
        assert_eq!(value.double(), Ok(1.5));
    }

    #[test]
    fn test_run_int() {
        let ctx = Context::create();
        let engine = engine(int_module(&ctx, "main", 32, 42));
        let value = unsafe { engine.run("main", Kind::Int) }.unwrap();

        assert_eq!(value.int(false), Ok(42));
        assert_eq!(value.view().int_width(), 32);
    }

    #[test]
    fn test_run_with_wrong_kind() {
        let ctx = Context::create();
        let engine = engine(double_module(&ctx, "main", 3.5));
        let result = unsafe { engine.run("main", Kind::String) };

        assert_eq!(
            result.unwrap_err(),
            Error::WrongKind { expected: Kind::String, found: Kind::Double }
        );
    }

    #[test]
    fn test_run_unknown_function() {
        let ctx = Context::create();
        let engine = engine(double_module(&ctx, "main", 3.5));
        let result = unsafe { engine.run("foo", Kind::Double) };

        assert_eq!(
            result.unwrap_err(),
            Error::UnknownFunction("foo".to_string())
        );
    }

    #[test]
    fn test_kind_of() {
        let ctx = Context::create();

        assert_eq!(
            engine(double_module(&ctx, "main", 1.0)).kind_of("main"),
            Ok(Kind::Double)
        );
        assert_eq!(
            engine(float_module(&ctx, "main", 1.0)).kind_of("main"),
            Ok(Kind::Float)
        );
        assert_eq!(
            engine(int_module(&ctx, "main", 64, 1)).kind_of("main"),
            Ok(Kind::Int)
        );
        assert_eq!(
            engine(string_module(&ctx, "main", "a")).kind_of("main"),
            Ok(Kind::Pointer)
        );
        assert_eq!(
            engine(void_module(&ctx, "main")).kind_of("main"),
            Err(Error::UnsupportedType("void".to_string()))
        );
    }
}

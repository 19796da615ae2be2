//! Embedding façade.
//!
//! A [`Context`] glues the front end, the compiler and one VM together
//! behind the surface embedders use: compile source or load object code
//! into callable program values, invoke any function value, register
//! native libraries, and read back the last error and stack trace. One
//! context per embedding; nothing here is process-global.

use crate::compiler::Compiler;
use crate::error::{Error, ErrorRecord, FrameInfo};
use crate::function::{Function, NativeFn, Program};
use crate::map::ValueMap;
use crate::params::VmParams;
use crate::parser;
use crate::value::Value;
use crate::vm::Vm;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// Compile-and-execute façade over one VM.
#[derive(Debug, Default)]
pub struct Context {
    vm: Vm,
    last_error: Option<ErrorRecord>,
}

impl Context {
    /// Context with default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with explicit VM limits.
    pub fn with_params(params: VmParams) -> Self {
        Self {
            vm: Vm::with_params(params),
            last_error: None,
        }
    }

    /// The underlying VM.
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Mutable access to the underlying VM, for natives and embedders
    /// that reach past the façade.
    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }

    /// Compile source text into a callable top-level program value.
    pub fn compile_source(&mut self, source: &str) -> Result<Value, Error> {
        let result = Self::compile_named(source, "<script>");
        self.record(result)
    }

    /// Compile a source file into a callable top-level program value.
    pub fn compile_file(&mut self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let path = path.as_ref();
        let result = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|source| Self::compile_named(&source, &path.display().to_string()));
        self.record(result)
    }

    fn compile_named(source: &str, name: &str) -> Result<Value, Error> {
        let ast = parser::parse(source)?;
        Ok(Compiler::new().compile(&ast, name)?)
    }

    /// Load a compiled object file's bytes back into a program value.
    pub fn load_object(&mut self, bytes: &[u8]) -> Result<Value, Error> {
        let result = Program::from_object_bytes(bytes, "<object>")
            .map(|program| Value::Function(Rc::new(Function::Program(Rc::new(program)))))
            .map_err(Error::from);
        self.record(result)
    }

    /// Load a compiled object file from disk.
    pub fn load_object_file(&mut self, path: impl AsRef<Path>) -> Result<Value, Error> {
        let result = std::fs::read(path.as_ref())
            .map_err(Error::from)
            .and_then(|bytes| {
                Ok(Program::from_object_bytes(
                    &bytes,
                    &path.as_ref().display().to_string(),
                )
                .map(|program| Value::Function(Rc::new(Function::Program(Rc::new(program)))))?)
            });
        self.record(result)
    }

    /// Raw object-file bytes of a compiled program value.
    pub fn dump_object(&mut self, func: &Value) -> Result<Vec<u8>, Error> {
        let result = match func {
            Value::Function(f) => match f.as_ref() {
                Function::Program(program) => Ok(program.dump()),
                _ => Err(Error::NotAProgram),
            },
            _ => Err(Error::NotAProgram),
        };
        self.record(result)
    }

    /// Call any function value with an explicit argument vector.
    pub fn call(&mut self, func: &Value, args: &[Value]) -> Result<Value, Error> {
        let result = self.vm.call_function(func, args).map_err(Error::from);
        self.record(result)
    }

    /// Compile and run a source string with no arguments.
    pub fn eval_source(&mut self, source: &str) -> Result<Value, Error> {
        let program = self.compile_source(source)?;
        self.call(&program, &[])
    }

    /// Register a library of native functions and constants.
    ///
    /// With a name, everything is grouped under one global hashmap named
    /// by the library; without, each entry lands flat in the globals.
    /// Host registration overwrites existing globals.
    pub fn register_library(
        &mut self,
        name: Option<&str>,
        functions: &[(&str, NativeFn)],
        constants: &[(&str, Value)],
    ) {
        match name {
            None => {
                for (fname, func) in functions {
                    self.vm.set_global(fname, Value::native(fname, *func));
                }
                for (cname, value) in constants {
                    self.vm.set_global(cname, value.clone());
                }
            }
            Some(lib) => {
                let mut map = ValueMap::new();
                for (fname, func) in functions {
                    map.set_str(fname, Value::native(fname, *func));
                }
                for (cname, value) in constants {
                    map.set_str(cname, value.clone());
                }
                self.vm
                    .set_global(lib, Value::Hashmap(Rc::new(RefCell::new(map))));
            }
        }
    }

    /// Value of a global; nil when unset.
    pub fn get_global(&self, name: &str) -> Value {
        self.vm.get_global(name)
    }

    /// Define or replace a global.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.vm.set_global(name, value);
    }

    /// Register a class descriptor for a type tag or pointer identity.
    pub fn set_class(&mut self, tag: Value, class: Value) -> Result<(), Error> {
        let result = self.vm.set_class(tag, class).map_err(|error| {
            Error::Runtime(crate::error::RuntimeTrap {
                error,
                address: None,
                backtrace: Vec::new(),
            })
        });
        self.record(result)
    }

    /// Kind, message and location of the last error, until the next
    /// successful operation.
    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.last_error.as_ref()
    }

    /// Stack trace of the last runtime error: callee names, innermost
    /// first. Valid until the next entry into the VM.
    pub fn backtrace(&self) -> &[FrameInfo] {
        self.vm.backtrace()
    }

    fn record<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(error) => self.last_error = Some(ErrorRecord::from(error)),
        }
        result
    }
}

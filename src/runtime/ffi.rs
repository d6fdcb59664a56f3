use libloading::Library;
use tracing::debug;

use super::interpreter::Interpreter;
use super::object::{ExceptionKind, FfiModule, NativeFn, NativeResult, Object};
use super::value::Value;

/// Entry point every loadable module must export. The module registers its
/// callables into the table it is handed; the loader turns each one into a
/// native-function object owned by the module.
pub const MODULE_INIT_SYMBOL: &str = "ore_module_init";

pub type ModuleInitFn = unsafe extern "C" fn(&mut ModuleExports);

#[derive(Default)]
pub struct ModuleExports {
    entries: Vec<(String, NativeFn)>,
}

impl ModuleExports {
    pub fn register(&mut self, name: &str, func: NativeFn) {
        self.entries.push((name.to_string(), func));
    }
}

/// Load a dynamic library and return a module object whose properties are the
/// callables it registered. The library handle is owned by the module object
/// and released when the collector sweeps it.
pub fn load_module(interpreter: &mut Interpreter, path: &str) -> NativeResult {
    let library = match unsafe { Library::new(path) } {
        Ok(library) => library,
        Err(error) => {
            return Err(interpreter.make_error(
                ExceptionKind::FileNotFound,
                &format!("Not a loadable module: {path} ({error})"),
            ))
        }
    };

    let init = match unsafe { library.get::<ModuleInitFn>(MODULE_INIT_SYMBOL.as_bytes()) } {
        Ok(symbol) => *symbol,
        Err(_) => {
            return Err(interpreter.make_error(
                ExceptionKind::Reference,
                &format!("Cannot find \"{MODULE_INIT_SYMBOL}\" in {path}."),
            ))
        }
    };

    let mut exports = ModuleExports::default();
    unsafe { init(&mut exports) };

    let module = interpreter
        .heap_mut()
        .allocate(Object::ffi_module(FfiModule::new(path, library)));
    for (name, func) in exports.entries {
        // each callable keeps a back-reference so the module (and its open
        // library handle) outlives every symbol that escaped from it
        let callable = interpreter
            .heap_mut()
            .allocate(Object::native_function(&name, func, Some(module)));
        interpreter
            .heap_mut()
            .object_mut(module)
            .put(&name, Value::Ref(callable));
    }

    debug!(path = path, "loaded dynamic module");
    Ok(Value::Ref(module))
}

//! Native entry points for interpreted functions.
//!
//! A [`Trampoline`] owns a libffi closure whose code pointer can be called as
//! an ordinary C function of the given [`Signature`]. The entry marshals the
//! native arguments to values, applies the target function and marshals the
//! result back.
//!
//! Errors and panics never unwind into native code. They are logged, stored
//! in a thread local slot readable with [`take_last_error`], and the call
//! returns a zeroed value.

use libffi::low::{closure_alloc, closure_free, ffi_cif, ffi_closure, prep_closure, CodePtr};
use std::{
    cell::RefCell,
    os::raw::c_void,
    panic::{self, AssertUnwindSafe},
    rc::Weak,
};

use crate::{
    error::{panic_message, Error, Result},
    ffi::{Argument, CallInterface, Pointer, RawPointer, Signature},
    function::Function,
    scope::Scope,
};

thread_local! {
    static LAST_ERROR: RefCell<Option<Error>> = RefCell::new(None);
}

/// Returns and clears the error raised by the most recent failing trampoline
/// call on this thread.
pub fn take_last_error() -> Option<Error> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

fn set_last_error(error: Error) {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(error));
}

struct Context {
    interface: CallInterface,
    signature: Signature,
    target: Weak<dyn Function>,
    scope: Option<Scope>,
}

impl Context {
    unsafe fn invoke(&self, args: *const *const c_void) -> Result<Argument> {
        let target = self.target.upgrade().ok_or(Error::SessionClosed)?;
        let mut values = Vec::with_capacity(self.signature.arguments().len());
        for (index, ty) in self.signature.arguments().iter().enumerate() {
            let pointer = Pointer::new(*args.add(index) as RawPointer);
            values.push(pointer.read_as(ty)?);
        }
        let scope = self.scope.clone().unwrap_or_default();
        let value = target.apply(&values, &scope)?;
        Argument::wrap_return(self.signature.returns(), value)
    }
}

unsafe extern "C" fn entry(
    _cif: &ffi_cif,
    result: &mut u64,
    args: *const *const c_void,
    context: &Context,
) {
    let slot = result as *mut u64 as *mut c_void;
    let returned = match panic::catch_unwind(AssertUnwindSafe(|| context.invoke(args))) {
        Ok(Ok(argument)) => argument,
        Ok(Err(error)) => {
            tracing::error!(%error, signature = %context.signature, "native call into interpreted function failed");
            set_last_error(error);
            Argument::zeroed(context.signature.returns())
        }
        Err(payload) => {
            let error = Error::NativePanic(panic_message(&*payload));
            tracing::error!(%error, signature = %context.signature, "native call into interpreted function panicked");
            set_last_error(error);
            Argument::zeroed(context.signature.returns())
        }
    };
    returned.write_return(slot);
}

/// A native function pointer forwarding to a [`Function`].
///
/// The trampoline holds its target weakly: it never keeps the function alive,
/// and calling it after the target is gone fails with
/// [`Error::SessionClosed`].
pub struct Trampoline {
    closure: *mut ffi_closure,
    code: CodePtr,
    context: Box<Context>,
}

impl Trampoline {
    /// Builds the call interface and the libffi closure. Fails without
    /// allocating anything if a type has no native representation.
    pub fn build(
        signature: &Signature,
        target: Weak<dyn Function>,
        scope: Option<Scope>,
    ) -> Result<Self> {
        let interface = CallInterface::new(signature)?;
        let mut context = Box::new(Context {
            interface,
            signature: signature.clone(),
            target,
            scope,
        });

        let (closure, code) = closure_alloc();
        if closure.is_null() {
            return Err(Error::UnsupportedSignatureType {
                ty: signature.to_string().into(),
                reason: "could not allocate a native closure".into(),
            });
        }

        let cif: *mut ffi_cif = context.interface.cif();
        let userdata: *const Context = &*context;
        let status = unsafe { prep_closure(closure, cif, entry, userdata, code) };
        if status.is_err() {
            unsafe { closure_free(closure) };
            return Err(Error::UnsupportedSignatureType {
                ty: signature.to_string().into(),
                reason: "the closure could not be prepared for this ABI".into(),
            });
        }

        tracing::debug!(%signature, code = ?code.as_ptr(), "built native trampoline");
        Ok(Trampoline {
            closure,
            code,
            context,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.context.signature
    }

    /// The entry point. Valid until the trampoline is dropped.
    pub fn function_pointer(&self) -> *const c_void {
        self.code.as_ptr()
    }
}

impl Drop for Trampoline {
    fn drop(&mut self) {
        tracing::trace!(signature = %self.context.signature, "releasing native trampoline");
        unsafe { closure_free(self.closure) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ffi::NativeType, function::NativeFunction, value::Value, vm::Evaluator};
    use std::rc::Rc;

    #[test]
    fn test_trampoline_forwards_to_target() {
        let evaluator = Evaluator::new();
        let negate: Rc<dyn Function> =
            NativeFunction::new(&evaluator, "negate", Some(1), |_, args, _| {
                Ok(Value::Int(-args[0].as_int().unwrap_or(0)))
            });
        let signature = Signature::new(vec![NativeType::I32], NativeType::I32);
        let trampoline = Trampoline::build(&signature, Rc::downgrade(&negate), None).unwrap();
        let f: extern "C" fn(i32) -> i32 =
            unsafe { std::mem::transmute(trampoline.function_pointer()) };
        assert_eq!(f(12), -12);
        assert!(take_last_error().is_none());
    }

    #[test]
    fn test_failures_are_recorded_not_unwound() {
        let evaluator = Evaluator::new();
        let failing: Rc<dyn Function> = NativeFunction::new(&evaluator, "failing", None, |_, _, _| {
            Err(Error::Exception("boom".into()))
        });
        let signature = Signature::new(vec![], NativeType::F64);
        let trampoline = Trampoline::build(&signature, Rc::downgrade(&failing), None).unwrap();
        let f: extern "C" fn() -> f64 = unsafe { std::mem::transmute(trampoline.function_pointer()) };
        assert_eq!(f(), 0.0);
        assert!(matches!(take_last_error(), Some(Error::Exception(message)) if &*message == "boom"));
        assert!(take_last_error().is_none());
    }

    #[test]
    fn test_dropped_target() {
        let evaluator = Evaluator::new();
        let target: Rc<dyn Function> =
            NativeFunction::new(&evaluator, "short-lived", None, |_, _, _| Ok(Value::Int(1)));
        let signature = Signature::new(vec![], NativeType::I64);
        let trampoline = Trampoline::build(&signature, Rc::downgrade(&target), None).unwrap();
        drop(target);
        let f: extern "C" fn() -> i64 = unsafe { std::mem::transmute(trampoline.function_pointer()) };
        assert_eq!(f(), 0);
        assert!(matches!(take_last_error(), Some(Error::SessionClosed)));
    }
}

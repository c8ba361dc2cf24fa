use std::{os::raw::c_void, rc::Rc};

use crate::{
    error::Result,
    ffi::Signature,
    function::Function,
    scope::Scope,
    trampoline::Trampoline,
};

/// Exposes any [`Function`] as a native function pointer of a fixed
/// signature.
///
/// Unlike the trampoline a closure builds for itself, the wrapper owns the
/// function it forwards to, so the pointer stays usable for as long as the
/// wrapper lives.
pub struct NativeFunctionWrapper {
    // Dropped after the trampoline that refers to it.
    trampoline: Trampoline,
    function: Rc<dyn Function>,
}

impl NativeFunctionWrapper {
    pub fn new(function: Rc<dyn Function>, signature: &Signature) -> Result<Self> {
        Self::with_scope(function, signature, None)
    }

    /// Native calls apply the function in `scope`, or in a fresh empty scope
    /// when it is `None`.
    pub fn with_scope(
        function: Rc<dyn Function>,
        signature: &Signature,
        scope: Option<Scope>,
    ) -> Result<Self> {
        let trampoline = Trampoline::build(signature, Rc::downgrade(&function), scope)?;
        Ok(NativeFunctionWrapper {
            trampoline,
            function,
        })
    }

    pub fn function(&self) -> &Rc<dyn Function> {
        &self.function
    }

    pub fn signature(&self) -> &Signature {
        self.trampoline.signature()
    }

    /// Valid while the wrapper is alive.
    pub fn function_pointer(&self) -> *const c_void {
        self.trampoline.function_pointer()
    }
}

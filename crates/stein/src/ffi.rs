//! Native types, signatures and the marshalling between interpreter values and
//! C values.

/// Returns a pointer to a statically allocated FFI type.
macro_rules! ffi_type {
    ($name: ident) => {
        ptr::addr_of_mut!(types::$name)
    };
}

/// Converts a &T to a *mut c_void pointer.
macro_rules! raw_pointer {
    ($value: expr) => {
        $value as *mut _ as RawPointer
    };
}

use libffi::low::{
    call as ffi_call, ffi_abi_FFI_DEFAULT_ABI as ABI, ffi_cif, ffi_type, prep_cif, types, CodePtr,
    Error as FFIError,
};
use libc::{c_char, size_t};
use std::{
    ffi::{CStr, CString},
    fmt, mem,
    os::raw::c_void,
    ptr,
};

use crate::{
    error::{Error, Result},
    value::Value,
};

/// A pointer to an FFI type.
pub(crate) type TypePointer = *mut ffi_type;

/// A raw C pointer.
pub(crate) type RawPointer = *mut c_void;

/// An opaque native address.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Pointer {
    inner: RawPointer,
}

impl Pointer {
    pub fn new(inner: *mut c_void) -> Self {
        Pointer { inner }
    }

    pub fn null() -> Self {
        Pointer::new(ptr::null_mut())
    }

    pub fn is_null(self) -> bool {
        self.inner.is_null()
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.inner
    }

    unsafe fn read<R>(self) -> R {
        ptr::read(self.inner as *mut R)
    }

    /// Reads a native value of type `ty` stored at this address.
    pub(crate) unsafe fn read_as(self, ty: &NativeType) -> Result<Value> {
        let value = match ty {
            NativeType::Bool => Value::Bool(self.read::<u8>() != 0),
            NativeType::I8 => Value::Int(self.read::<i8>() as i64),
            NativeType::U8 => Value::Int(self.read::<u8>() as i64),
            NativeType::I16 => Value::Int(self.read::<i16>() as i64),
            NativeType::U16 => Value::Int(self.read::<u16>() as i64),
            NativeType::I32 => Value::Int(self.read::<i32>() as i64),
            NativeType::U32 => Value::Int(self.read::<u32>() as i64),
            NativeType::I64 => Value::Int(self.read::<i64>()),
            NativeType::U64 => Value::Int(self.read::<u64>() as i64),
            NativeType::Usize => Value::Int(self.read::<usize>() as i64),
            NativeType::F32 => Value::Float(self.read::<f32>() as f64),
            NativeType::F64 => Value::Float(self.read::<f64>()),
            NativeType::Pointer => Value::Pointer(Pointer::new(self.read::<RawPointer>())),
            NativeType::Object => {
                let handle = self.read::<*const Value>();
                if handle.is_null() {
                    Value::NULL
                } else {
                    (*handle).clone()
                }
            }
            NativeType::CString => {
                let string = self.read::<*const c_char>();
                if string.is_null() {
                    Value::NULL
                } else {
                    Value::from(CStr::from_ptr(string).to_string_lossy().as_ref())
                }
            }
            NativeType::Void | NativeType::Unsupported(_) => {
                return Err(ty.unsupported("cannot be read as an argument"))
            }
        };
        Ok(value)
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:p})", self.inner)
    }
}

/// A C type a native signature can mention.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeType {
    /// Only valid as a return type.
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    Usize,
    F32,
    F64,
    Pointer,
    /// A `*const Value` handle. Returned handles are owned by the caller, see
    /// [`release_object`].
    Object,
    /// A NUL terminated `const char*`. Only valid as an argument.
    CString,
    Unsupported(Box<str>),
}

impl NativeType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "void" => NativeType::Void,
            "bool" | "BOOL" => NativeType::Bool,
            "char" => NativeType::I8,
            "uchar" => NativeType::U8,
            "short" => NativeType::I16,
            "ushort" => NativeType::U16,
            "int" => NativeType::I32,
            "uint" => NativeType::U32,
            "long" => NativeType::I64,
            "ulong" => NativeType::U64,
            "size_t" => NativeType::Usize,
            "float" => NativeType::F32,
            "double" => NativeType::F64,
            "pointer" => NativeType::Pointer,
            "id" | "object" => NativeType::Object,
            "string" => NativeType::CString,
            other => NativeType::Unsupported(other.into()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NativeType::Void => "void",
            NativeType::Bool => "bool",
            NativeType::I8 => "char",
            NativeType::U8 => "uchar",
            NativeType::I16 => "short",
            NativeType::U16 => "ushort",
            NativeType::I32 => "int",
            NativeType::U32 => "uint",
            NativeType::I64 => "long",
            NativeType::U64 => "ulong",
            NativeType::Usize => "size_t",
            NativeType::F32 => "float",
            NativeType::F64 => "double",
            NativeType::Pointer => "pointer",
            NativeType::Object => "id",
            NativeType::CString => "string",
            NativeType::Unsupported(name) => name,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            NativeType::I8
                | NativeType::U8
                | NativeType::I16
                | NativeType::U16
                | NativeType::I32
                | NativeType::U32
                | NativeType::I64
                | NativeType::U64
                | NativeType::Usize
        )
    }

    fn unsupported(&self, reason: &str) -> Error {
        Error::UnsupportedSignatureType {
            ty: self.name().into(),
            reason: reason.into(),
        }
    }

    /// Converts `value` to what a round trip through this native type would
    /// produce. Integers are truncated to the type's width, floats to its
    /// precision. `Unsupported` passes values through untouched so closures
    /// with exotic annotations stay usable from the interpreter.
    pub fn coerce(&self, value: &Value) -> Result<Value> {
        let integer = || match value {
            Value::Int(x) => Ok(*x),
            Value::Float(x) => Ok(*x as i64),
            Value::Bool(x) => Ok(*x as i64),
            other => Err(Error::coercion(self.name(), other.pretty_description())),
        };
        let float = || {
            value
                .as_float()
                .ok_or_else(|| Error::coercion(self.name(), value.pretty_description()))
        };
        let coerced = match self {
            NativeType::Void => Value::NULL,
            NativeType::Bool => Value::Bool(value.is_true()),
            NativeType::I8 => Value::Int(integer()? as i8 as i64),
            NativeType::U8 => Value::Int(integer()? as u8 as i64),
            NativeType::I16 => Value::Int(integer()? as i16 as i64),
            NativeType::U16 => Value::Int(integer()? as u16 as i64),
            NativeType::I32 => Value::Int(integer()? as i32 as i64),
            NativeType::U32 => Value::Int(integer()? as u32 as i64),
            NativeType::I64 | NativeType::U64 => Value::Int(integer()?),
            NativeType::Usize => Value::Int(integer()? as usize as i64),
            NativeType::F32 => Value::Float(float()? as f32 as f64),
            NativeType::F64 => Value::Float(float()?),
            NativeType::Pointer => match value {
                Value::Pointer(_) => value.clone(),
                Value::Null => Value::Pointer(Pointer::null()),
                other => return Err(Error::coercion(self.name(), other.pretty_description())),
            },
            NativeType::CString => match value {
                Value::Str(_) | Value::Null => value.clone(),
                other => return Err(Error::coercion(self.name(), other.pretty_description())),
            },
            NativeType::Object | NativeType::Unsupported(_) => value.clone(),
        };
        Ok(coerced)
    }

    /// Returns the FFI type describing this type in argument or return
    /// position.
    pub(crate) unsafe fn ffi_type(&self, returned: bool) -> Result<TypePointer> {
        let typ = match self {
            NativeType::Void if returned => ffi_type!(void),
            NativeType::Void => return Err(self.unsupported("void is only valid as a return type")),
            NativeType::Bool | NativeType::U8 => ffi_type!(uint8),
            NativeType::I8 => ffi_type!(sint8),
            NativeType::I16 => ffi_type!(sint16),
            NativeType::U16 => ffi_type!(uint16),
            NativeType::I32 => ffi_type!(sint32),
            NativeType::U32 => ffi_type!(uint32),
            NativeType::I64 => ffi_type!(sint64),
            NativeType::U64 => ffi_type!(uint64),
            NativeType::Usize => {
                match mem::size_of::<size_t>() * 8 {
                    64 => ffi_type!(uint64),
                    32 => ffi_type!(uint32),
                    8 => ffi_type!(uint8),

                    // `size_t` is at least 16 bits.
                    _ => ffi_type!(uint16),
                }
            }
            NativeType::F32 => ffi_type!(float),
            NativeType::F64 => ffi_type!(double),
            NativeType::Pointer | NativeType::Object => ffi_type!(pointer),
            NativeType::CString if !returned => ffi_type!(pointer),
            NativeType::CString => {
                return Err(self.unsupported("strings cannot be returned to native code"))
            }
            NativeType::Unsupported(_) => return Err(self.unsupported("no native representation")),
        };
        Ok(typ)
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Argument types and return type of a native function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    arguments: Vec<NativeType>,
    returns: NativeType,
}

impl Signature {
    pub fn new(arguments: Vec<NativeType>, returns: NativeType) -> Self {
        Self { arguments, returns }
    }

    /// Builds a signature from type names, e.g. `Signature::parse(&["int"], "int")`.
    pub fn parse(arguments: &[&str], returns: &str) -> Self {
        Self::new(
            arguments.iter().map(|name| NativeType::from_name(name)).collect(),
            NativeType::from_name(returns),
        )
    }

    pub fn arguments(&self) -> &[NativeType] {
        &self.arguments
    }

    pub fn returns(&self) -> &NativeType {
        &self.returns
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, ty) in self.arguments.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            f.write_str(ty.name())?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// A value of some sort to be passed to or returned from a C function.
pub(crate) enum Argument {
    Pointer(RawPointer),
    Void,
    F32(f32),
    F64(f64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl Argument {
    /// Converts `value` to the C representation of `ty`. Strings become
    /// pointers into `strings`, which must outlive the native call; object
    /// handles point at `value` itself.
    pub(crate) fn wrap(ty: &NativeType, value: &Value, strings: &mut Vec<CString>) -> Result<Self> {
        let coerced = ty.coerce(value)?;
        let int = coerced.as_int().unwrap_or(0);
        let argument = match ty {
            NativeType::Void => Argument::Void,
            NativeType::Bool => Argument::U8(coerced.is_true() as u8),
            NativeType::I8 => Argument::I8(int as i8),
            NativeType::U8 => Argument::U8(int as u8),
            NativeType::I16 => Argument::I16(int as i16),
            NativeType::U16 => Argument::U16(int as u16),
            NativeType::I32 => Argument::I32(int as i32),
            NativeType::U32 => Argument::U32(int as u32),
            NativeType::I64 => Argument::I64(int),
            NativeType::U64 => Argument::U64(int as u64),
            NativeType::Usize => Argument::U64(int as usize as u64),
            NativeType::F32 => Argument::F32(coerced.as_float().unwrap_or(0.0) as f32),
            NativeType::F64 => Argument::F64(coerced.as_float().unwrap_or(0.0)),
            NativeType::Pointer => match coerced {
                Value::Pointer(pointer) => Argument::Pointer(pointer.as_ptr()),
                _ => Argument::Pointer(ptr::null_mut()),
            },
            NativeType::Object => Argument::Pointer(value as *const Value as RawPointer),
            NativeType::CString => match coerced.as_str() {
                Some(text) => {
                    let string = CString::new(text).map_err(|_| {
                        Error::coercion("string", "a string with an interior NUL byte")
                    })?;
                    let pointer = string.as_ptr() as RawPointer;
                    strings.push(string);
                    Argument::Pointer(pointer)
                }
                None => Argument::Pointer(ptr::null_mut()),
            },
            NativeType::Unsupported(_) => return Err(ty.unsupported("no native representation")),
        };
        Ok(argument)
    }

    /// Converts a value returned by interpreted code to the C representation
    /// of `ty`. Objects are boxed; the native caller owns the handle.
    pub(crate) fn wrap_return(ty: &NativeType, value: Value) -> Result<Self> {
        match ty {
            NativeType::Object => Ok(Argument::Pointer(
                Box::into_raw(Box::new(value)) as RawPointer
            )),
            _ => Argument::wrap(ty, &value, &mut Vec::new()),
        }
    }

    /// The value returned to native code when the interpreted side failed.
    pub(crate) fn zeroed(ty: &NativeType) -> Self {
        match ty {
            NativeType::Void | NativeType::Unsupported(_) => Argument::Void,
            NativeType::F32 => Argument::F32(0.0),
            NativeType::F64 => Argument::F64(0.0),
            NativeType::Pointer | NativeType::Object | NativeType::CString => {
                Argument::Pointer(ptr::null_mut())
            }
            _ => Argument::I64(0),
        }
    }

    /// Returns a C pointer to the wrapped value.
    fn as_c_pointer(&mut self) -> RawPointer {
        match self {
            Argument::Pointer(ref mut val) => {
                // When passing a pointer we shouldn't pass the pointer
                // directly, instead we want a pointer to the pointer to pass to
                // the underlying C function.
                val as *mut RawPointer as RawPointer
            }
            Argument::Void => ptr::null_mut() as RawPointer,
            Argument::F32(ref mut val) => raw_pointer!(val),
            Argument::F64(ref mut val) => raw_pointer!(val),
            Argument::I8(ref mut val) => raw_pointer!(val),
            Argument::I16(ref mut val) => raw_pointer!(val),
            Argument::I32(ref mut val) => raw_pointer!(val),
            Argument::I64(ref mut val) => raw_pointer!(val),
            Argument::U8(ref mut val) => raw_pointer!(val),
            Argument::U16(ref mut val) => raw_pointer!(val),
            Argument::U32(ref mut val) => raw_pointer!(val),
            Argument::U64(ref mut val) => raw_pointer!(val),
        }
    }

    /// Stores a return value into the result slot libffi hands a closure.
    /// Integral values narrower than a register are widened to `ffi_arg`.
    pub(crate) unsafe fn write_return(self, slot: *mut c_void) {
        match self {
            Argument::Void => {}
            Argument::Pointer(x) => ptr::write(slot as *mut RawPointer, x),
            Argument::F32(x) => ptr::write(slot as *mut f32, x),
            Argument::F64(x) => ptr::write(slot as *mut f64, x),
            Argument::I8(x) => ptr::write(slot as *mut isize, x as isize),
            Argument::I16(x) => ptr::write(slot as *mut isize, x as isize),
            Argument::I32(x) => ptr::write(slot as *mut isize, x as isize),
            Argument::I64(x) => ptr::write(slot as *mut i64, x),
            Argument::U8(x) => ptr::write(slot as *mut usize, x as usize),
            Argument::U16(x) => ptr::write(slot as *mut usize, x as usize),
            Argument::U32(x) => ptr::write(slot as *mut usize, x as usize),
            Argument::U64(x) => ptr::write(slot as *mut u64, x),
        }
    }
}

/// A prepared libffi call interface for one signature. The argument type
/// table lives on the heap so the cif stays valid when this value moves.
pub(crate) struct CallInterface {
    cif: Box<ffi_cif>,
    arguments: Box<[TypePointer]>,
    return_type: TypePointer,
}

impl CallInterface {
    pub(crate) fn new(signature: &Signature) -> Result<Self> {
        unsafe {
            let return_type = signature.returns().ffi_type(true)?;
            let arguments = signature
                .arguments()
                .iter()
                .map(|ty| ty.ffi_type(false))
                .collect::<Result<Box<[_]>>>()?;
            let mut interface = CallInterface {
                cif: Box::new(Default::default()),
                arguments,
                return_type,
            };

            let result = prep_cif(
                &mut *interface.cif,
                ABI,
                interface.arguments.len(),
                interface.return_type,
                interface.arguments.as_mut_ptr(),
            );

            match result {
                Ok(_) => Ok(interface),
                Err(FFIError::Typedef) => Err(Error::UnsupportedSignatureType {
                    ty: signature.to_string().into(),
                    reason: "the type representation is invalid or unsupported".into(),
                }),
                Err(FFIError::Abi) => Err(Error::UnsupportedSignatureType {
                    ty: signature.to_string().into(),
                    reason: "the ABI is invalid or unsupported".into(),
                }),
            }
        }
    }

    pub(crate) fn cif(&mut self) -> *mut ffi_cif {
        &mut *self.cif
    }
}

/// A native function pointer together with the signature it is called with.
pub struct ForeignFunction {
    pointer: CodePtr,
    signature: Signature,
    interface: CallInterface,
}

impl ForeignFunction {
    /// # Safety
    ///
    /// `pointer` must be a function callable with `signature` for as long as
    /// the returned value is used.
    pub unsafe fn new(pointer: *const c_void, signature: Signature) -> Result<Self> {
        let interface = CallInterface::new(&signature)?;
        Ok(ForeignFunction {
            pointer: CodePtr::from_ptr(pointer),
            signature,
            interface,
        })
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Calls the function with the given arguments.
    ///
    /// # Safety
    ///
    /// Same as [`ForeignFunction::new`]. Returned object handles are taken
    /// over and released by this call.
    pub unsafe fn call(&mut self, values: &[Value]) -> Result<Value> {
        let expected = self.signature.arguments().len();
        if values.len() != expected {
            return Err(Error::ArityMismatch {
                function: format!("{:p}", self.pointer.as_ptr()).into(),
                expected,
                got: values.len(),
            });
        }

        let mut strings = Vec::new();
        let mut arguments = Vec::with_capacity(values.len());
        for (ty, value) in self.signature.arguments().iter().zip(values) {
            arguments.push(Argument::wrap(ty, value, &mut strings)?);
        }

        // libffi expects an array of _pointers_ to the arguments to pass,
        // instead of an array containing the arguments directly. The pointers
        // and the values they point to must outlive the FFI call, otherwise we
        // may end up passing pointers to invalid memory.
        let mut argument_pointers: Vec<RawPointer> =
            arguments.iter_mut().map(Argument::as_c_pointer).collect();

        let cif = self.interface.cif();
        let args = argument_pointers.as_mut_ptr();
        let pointer = self.pointer;
        let value = match self.signature.returns() {
            NativeType::Void => {
                ffi_call::<()>(cif, pointer, args);
                Value::NULL
            }
            NativeType::Bool => Value::Bool(ffi_call::<usize>(cif, pointer, args) as u8 != 0),
            NativeType::I8 => Value::Int(ffi_call::<usize>(cif, pointer, args) as i8 as i64),
            NativeType::U8 => Value::Int(ffi_call::<usize>(cif, pointer, args) as u8 as i64),
            NativeType::I16 => Value::Int(ffi_call::<usize>(cif, pointer, args) as i16 as i64),
            NativeType::U16 => Value::Int(ffi_call::<usize>(cif, pointer, args) as u16 as i64),
            NativeType::I32 => Value::Int(ffi_call::<usize>(cif, pointer, args) as i32 as i64),
            NativeType::U32 => Value::Int(ffi_call::<usize>(cif, pointer, args) as u32 as i64),
            NativeType::I64 | NativeType::U64 => Value::Int(ffi_call::<u64>(cif, pointer, args) as i64),
            NativeType::Usize => Value::Int(ffi_call::<usize>(cif, pointer, args) as i64),
            NativeType::F32 => Value::Float(ffi_call::<f32>(cif, pointer, args) as f64),
            NativeType::F64 => Value::Float(ffi_call::<f64>(cif, pointer, args)),
            NativeType::Pointer => Value::Pointer(Pointer::new(ffi_call::<RawPointer>(cif, pointer, args))),
            NativeType::Object => take_object(ffi_call::<*mut Value>(cif, pointer, args)),
            NativeType::CString | NativeType::Unsupported(_) => {
                return Err(self.signature.returns().unsupported("cannot be returned"))
            }
        };
        drop(strings);
        Ok(value)
    }
}

/// Takes ownership of an object handle returned by a trampoline.
///
/// # Safety
///
/// `handle` must be null or a handle returned from native code through an
/// `id` return type that was not released before.
pub unsafe fn take_object(handle: *mut Value) -> Value {
    if handle.is_null() {
        Value::NULL
    } else {
        *Box::from_raw(handle)
    }
}

/// Releases an object handle returned by a trampoline.
///
/// # Safety
///
/// See [`take_object`].
pub unsafe extern "C" fn release_object(handle: *mut Value) {
    drop(take_object(handle));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for name in [
            "void", "bool", "char", "uchar", "short", "ushort", "int", "uint", "long", "ulong",
            "size_t", "float", "double", "pointer", "id", "string",
        ] {
            assert_eq!(NativeType::from_name(name).name(), name);
        }
        assert_eq!(
            NativeType::from_name("struct point"),
            NativeType::Unsupported("struct point".into())
        );
    }

    #[test]
    fn test_coerce_truncates_to_width() {
        assert_eq!(NativeType::I8.coerce(&Value::Int(300)).unwrap(), Value::Int(44));
        assert_eq!(NativeType::U8.coerce(&Value::Int(-1)).unwrap(), Value::Int(255));
        assert_eq!(NativeType::I32.coerce(&Value::Float(2.9)).unwrap(), Value::Int(2));
        assert_eq!(NativeType::F32.coerce(&Value::Int(3)).unwrap(), Value::Float(3.0));
        assert_eq!(NativeType::Bool.coerce(&Value::Int(0)).unwrap(), Value::FALSE);
        assert_eq!(NativeType::Void.coerce(&Value::Int(9)).unwrap(), Value::NULL);
    }

    #[test]
    fn test_coerce_rejects_mismatched_values() {
        match NativeType::I32.coerce(&Value::from("five")) {
            Err(Error::TypeCoercion { expected, found }) => {
                assert_eq!(&*expected, "int");
                assert_eq!(&*found, "\"five\"");
            }
            other => panic!("expected a coercion error, got {:?}", other),
        }
        assert!(NativeType::F64.coerce(&Value::NULL).is_err());
        assert!(NativeType::Pointer.coerce(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_unsupported_types_pass_values_through() {
        let value = Value::from("anything");
        assert_eq!(NativeType::from_name("quux").coerce(&value).unwrap(), value);
    }

    #[test]
    fn test_call_interface_rejects_unrepresentable_types() {
        let error = CallInterface::new(&Signature::parse(&["int", "quux"], "int")).err();
        assert!(matches!(error, Some(Error::UnsupportedSignatureType { ty, .. }) if &*ty == "quux"));
        let error = CallInterface::new(&Signature::parse(&["void"], "int")).err();
        assert!(matches!(error, Some(Error::UnsupportedSignatureType { .. })));
        let error = CallInterface::new(&Signature::parse(&[], "string")).err();
        assert!(matches!(error, Some(Error::UnsupportedSignatureType { .. })));
    }

    extern "C" fn add_i32(a: i32, b: i32) -> i32 {
        a + b
    }

    extern "C" fn scale(x: f64, by: f32) -> f64 {
        x * by as f64
    }

    extern "C" fn length(text: *const c_char) -> usize {
        unsafe { CStr::from_ptr(text).to_bytes().len() }
    }

    #[test]
    fn test_foreign_function_calls() {
        unsafe {
            let mut add =
                ForeignFunction::new(add_i32 as *const c_void, Signature::parse(&["int", "int"], "int"))
                    .unwrap();
            assert_eq!(add.call(&[Value::Int(2), Value::Int(-7)]).unwrap(), Value::Int(-5));
            assert!(matches!(
                add.call(&[Value::Int(2)]),
                Err(Error::ArityMismatch { expected: 2, got: 1, .. })
            ));

            let mut scale = ForeignFunction::new(
                scale as *const c_void,
                Signature::parse(&["double", "float"], "double"),
            )
            .unwrap();
            assert_eq!(
                scale.call(&[Value::Float(1.5), Value::Int(4)]).unwrap(),
                Value::Float(6.0)
            );

            let mut length = ForeignFunction::new(
                length as *const c_void,
                Signature::parse(&["string"], "size_t"),
            )
            .unwrap();
            assert_eq!(length.call(&[Value::from("stein")]).unwrap(), Value::Int(5));
        }
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(
            Signature::parse(&["int", "double"], "void").to_string(),
            "(int double) -> void"
        );
    }
}

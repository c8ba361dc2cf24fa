//! Stein: a small message-passing Lisp with native entry points.
//!
//! Source is parsed into expression trees by [`parse`] and evaluated by an
//! [`Evaluator`] session. Closures declaring a native signature get a C
//! function pointer through [`trampoline`], and [`ffi`] calls native code
//! the other way.

pub mod ast;
pub mod builtin;
pub mod class;
pub mod closure;
pub mod config;
pub mod error;
pub mod extensions;
pub mod ffi;
pub mod function;
pub mod interpreter;
pub mod object;
pub mod parser;
pub mod scope;
pub mod trampoline;
pub mod value;
pub mod vm;
pub mod wrapper;

pub use ast::{Expr, ExprKind, Position, Span};
pub use class::{Class, ClassRegistry, Method};
pub use closure::{Closure, Parameter, Prototype};
pub use config::Config;
pub use error::{Error, Fault, Result, SyntaxError, SyntaxErrorKind};
pub use ffi::{ForeignFunction, NativeType, Signature};
pub use function::{Function, NativeFunction};
pub use object::Instance;
pub use parser::parse;
pub use scope::Scope;
pub use value::Value;
pub use vm::{Evaluator, Source, WeakEvaluator};
pub use wrapper::NativeFunctionWrapper;

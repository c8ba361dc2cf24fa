use std::{os::raw::c_void, rc::Rc};

use pretty_assertions::assert_eq;
use stein::{
    ffi::Pointer,
    trampoline::take_last_error, Closure, Error, Evaluator, ForeignFunction, Function,
    NativeFunction, NativeFunctionWrapper, Signature, Value,
};

fn function(evaluator: &Evaluator, name: &str) -> Rc<dyn Function> {
    match evaluator.root_scope().lookup(name) {
        Some(Value::Function(function)) => function,
        other => panic!("{} is not a function: {:?}", name, other),
    }
}

fn entry_point(function: &Rc<dyn Function>) -> *const c_void {
    function
        .as_any()
        .downcast_ref::<Closure>()
        .and_then(Closure::function_pointer)
        .expect("closure has a native entry point")
}

#[test]
fn test_typed_closure_through_its_native_pointer() {
    let evaluator = Evaluator::new();
    evaluator
        .run("(function negate ((x int) -> int) (0 - x))", "test")
        .unwrap();
    let negate = function(&evaluator, "negate");
    let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(entry_point(&negate)) };
    assert_eq!(f(5), -5);
    assert_eq!(f(-7), 7);
    assert!(take_last_error().is_none());
}

#[test]
fn test_native_and_interpreted_calls_agree() {
    let evaluator = Evaluator::new();
    let cases: &[(&str, &str, &[&str], &str, Vec<Value>)] = &[
        ("inc", "((x char) -> char) (x + 1)", &["char"], "char", vec![Value::Int(127)]),
        ("widen", "((x uchar) -> long) (x * 1000)", &["uchar"], "long", vec![Value::Int(-1)]),
        ("half", "((x double) -> double) (x / 2)", &["double"], "double", vec![Value::Float(5.0)]),
        ("narrow", "((x double) -> float) x", &["double"], "float", vec![Value::Float(0.1)]),
        (
            "mix",
            "((a short) (b uint) -> long) (a + b)",
            &["short", "uint"],
            "long",
            vec![Value::Int(70000), Value::Int(-1)],
        ),
        ("positive", "((x int) -> bool) (x > 0)", &["int"], "bool", vec![Value::Int(3)]),
        ("twice", "((x id) -> id) (list x x)", &["id"], "id", vec![Value::from("s")]),
        ("unsigned", "((x ushort) -> int) x", &["ushort"], "int", vec![Value::Int(-1)]),
        ("next", "((x ulong) -> ulong) (x + 1)", &["ulong"], "ulong", vec![Value::Int(41)]),
        ("scaled", "((n size_t) -> size_t) (n * 2)", &["size_t"], "size_t", vec![Value::Int(21)]),
        (
            "same",
            "((p pointer) -> pointer) p",
            &["pointer"],
            "pointer",
            vec![Value::Pointer(Pointer::new(0x1000 as *mut c_void))],
        ),
        ("measure", "((s string) -> long) (s length)", &["string"], "long", vec![Value::from("hello")]),
    ];
    for (name, definition, arguments, returns, values) in cases {
        evaluator
            .run(&format!("(function {} {})", name, definition), "test")
            .unwrap();
        let closure = function(&evaluator, name);
        let interpreted = closure.apply(values, evaluator.root_scope()).unwrap();
        let mut foreign = unsafe {
            ForeignFunction::new(entry_point(&closure), Signature::parse(arguments, returns))
        }
        .unwrap();
        let native = unsafe { foreign.call(values) }.unwrap();
        assert_eq!(native, interpreted, "{} disagrees", name);
        assert!(take_last_error().is_none());
    }
}

#[test]
fn test_unsupported_annotation_falls_back_to_the_interpreter() {
    let evaluator = Evaluator::new();
    let result = evaluator
        .run(
            "(function area ((p rect) -> double) (p * 2))
             (area 21)",
            "test",
        )
        .unwrap();
    assert_eq!(result, Value::Float(42.0));
    let area = function(&evaluator, "area");
    let closure = area.as_any().downcast_ref::<Closure>().unwrap();
    assert!(closure.function_pointer().is_none());
    assert!(matches!(
        closure.trampoline_error(),
        Some(Error::UnsupportedSignatureType { .. })
    ));
}

#[test]
fn test_failing_closure_returns_zero_to_native_callers() {
    let evaluator = Evaluator::new();
    evaluator
        .run("(function fails ((x long) -> long) (raise \"nope\" x))", "test")
        .unwrap();
    let fails = function(&evaluator, "fails");
    let f: extern "C" fn(i64) -> i64 = unsafe { std::mem::transmute(entry_point(&fails)) };
    assert_eq!(f(9), 0);
    assert!(matches!(take_last_error(), Some(Error::Exception(message)) if &*message == "nope 9"));
}

#[test]
fn test_wrapper_over_a_native_function() {
    let evaluator = Evaluator::new();
    let clamp: Rc<dyn Function> = NativeFunction::new(&evaluator, "clamp", Some(1), |_, args, _| {
        Ok(Value::Int(args[0].as_int().unwrap_or(0).clamp(0, 10)))
    });
    let wrapper = NativeFunctionWrapper::new(clamp, &Signature::parse(&["int"], "int")).unwrap();
    let f: extern "C" fn(i32) -> i32 = unsafe { std::mem::transmute(wrapper.function_pointer()) };
    assert_eq!((f(-3), f(4), f(99)), (0, 4, 10));
}

#[test]
fn test_entry_point_outliving_the_session() {
    let evaluator = Evaluator::new();
    evaluator
        .run("(function seven (-> int) 7)", "test")
        .unwrap();
    let seven = function(&evaluator, "seven");
    let f: extern "C" fn() -> i32 = unsafe { std::mem::transmute(entry_point(&seven)) };
    assert_eq!(f(), 7);
    drop(evaluator);
    // The closure is still alive through `seven`, its session is not.
    assert_eq!(f(), 0);
    assert!(matches!(take_last_error(), Some(Error::SessionClosed)));
}

#[test]
fn test_unsigned_and_string_arguments_through_native_pointers() {
    let evaluator = Evaluator::new();
    evaluator
        .run(
            "(function widen ((x ushort) -> int) x)
             (function measure ((s string) -> size_t) (s length))",
            "test",
        )
        .unwrap();
    let widen = function(&evaluator, "widen");
    let f: extern "C" fn(u16) -> i32 = unsafe { std::mem::transmute(entry_point(&widen)) };
    assert_eq!(f(u16::MAX), 65535);
    let measure = function(&evaluator, "measure");
    let g: extern "C" fn(*const std::os::raw::c_char) -> usize =
        unsafe { std::mem::transmute(entry_point(&measure)) };
    let text = std::ffi::CString::new("stein").unwrap();
    assert_eq!(g(text.as_ptr()), 5);
    assert!(take_last_error().is_none());
}

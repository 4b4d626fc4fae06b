mod common;

use self::common::FakeProcess;
use pyproxy::{
    list_interpreter_states,
    structs::{PyObject, PyRuntimeState, PyThreadState, TypeFlags},
    Address, Error, StructKind,
};

const PY_RUNTIME: u64 = 0x1000;
const INTERP1: u64 = 0x2000;
const INTERP2: u64 = 0x3000;
const THREAD1: u64 = 0x4000;
const THREAD2: u64 = 0x4800;

fn scenario(process: &FakeProcess) {
    process.symbol("_PyRuntime", PY_RUNTIME);
    process.alloc(StructKind::PyRuntimeState, PY_RUNTIME);

    let interpreters = PY_RUNTIME + process.offset(StructKind::PyRuntimeState, "interpreters");
    process.set(StructKind::PyInterpreters, interpreters, "head", INTERP2);
    process.set(StructKind::PyInterpreters, interpreters, "main", INTERP1);
    process.set(StructKind::PyInterpreters, interpreters, "next_id", 2);

    // new interpreters are pushed to the front.
    process.alloc(StructKind::PyInterpreterState, INTERP2);
    process.set(StructKind::PyInterpreterState, INTERP2, "id", 1);
    process.set(StructKind::PyInterpreterState, INTERP2, "next", INTERP1);

    process.alloc(StructKind::PyInterpreterState, INTERP1);
    process.set(StructKind::PyInterpreterState, INTERP1, "tstate_head", THREAD2);

    process.alloc(StructKind::PyThreadState, THREAD2);
    process.set(StructKind::PyThreadState, THREAD2, "next", THREAD1);
    process.set(StructKind::PyThreadState, THREAD2, "interp", INTERP1);
    process.set(StructKind::PyThreadState, THREAD2, "thread_id", 2);

    process.alloc(StructKind::PyThreadState, THREAD1);
    process.set(StructKind::PyThreadState, THREAD1, "prev", THREAD2);
    process.set(StructKind::PyThreadState, THREAD1, "interp", INTERP1);
    process.set(StructKind::PyThreadState, THREAD1, "thread_id", 1);
}

#[test]
fn test_interpreters_from_runtime_state() {
    let process = FakeProcess::new(3, 7);
    scenario(&process);
    let handle = process.handle();

    let interps = list_interpreter_states(&handle)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(2, interps.len());
    assert_eq!(Address::new(INTERP2), interps[0].address());
    assert_eq!(1, interps[0].id().unwrap().read().unwrap());
    assert_eq!(Address::new(INTERP1), interps[1].address());
    assert_eq!(0, interps[1].id().unwrap().read().unwrap());

    let runtime = handle.static_struct::<PyRuntimeState>("_PyRuntime").unwrap();
    let interpreters = runtime.interpreters().unwrap();
    assert_eq!(interps[1], interpreters.main().unwrap().deref().unwrap());
    assert_eq!(2, interpreters.next_id().unwrap().read().unwrap());
    assert!(!runtime.initialized().unwrap().read().unwrap());
    assert!(runtime.finalizing().unwrap().try_deref().unwrap().is_none());

    let thread_ids = interps[1]
        .thread_states()
        .unwrap()
        .map(|t| t.unwrap().thread_id().unwrap().read().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(vec![2, 1], thread_ids);

    let thread1 = interps[1].thread_states().unwrap().nth(1).unwrap().unwrap();
    assert_eq!(Address::new(THREAD2), thread1.prev().unwrap().read().unwrap());

    assert_eq!(1, process.lookups());
}

#[test]
fn test_field_sign() {
    let process = FakeProcess::new(3, 7);
    process.alloc(StructKind::PyThreadState, THREAD1);
    process.set(StructKind::PyThreadState, THREAD1, "recursion_depth", u64::MAX);
    process.set(StructKind::PyThreadState, THREAD1, "thread_id", 0xf7a0_0000_0000_0000);

    let handle = process.handle();
    let thread = handle.struct_proxy::<PyThreadState>(Address::new(THREAD1));

    assert_eq!(-1, thread.recursion_depth().unwrap().read().unwrap());
    assert_eq!(-1, thread.scalar::<i64>("recursion_depth").unwrap().read().unwrap());

    match thread.scalar::<u32>("recursion_depth").unwrap().read() {
        Err(Error::ValueConversion(-1, "u32")) => (),
        other => panic!("unexpected: {:?}", other),
    }

    match thread.scalar::<u64>("recursion_depth").unwrap().read() {
        Err(Error::ValueConversion(-1, "u64")) => (),
        other => panic!("unexpected: {:?}", other),
    }

    // `unsigned long` in 3.7.
    assert_eq!(
        0xf7a0_0000_0000_0000,
        thread.thread_id().unwrap().read().unwrap()
    );

    match thread.scalar::<i64>("thread_id").unwrap().read() {
        Err(Error::ValueConversion(value, "i64")) => assert_eq!(0xf7a0_0000_0000_0000, value),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_runtime_symbol_missing() {
    let process = FakeProcess::new(3, 7);
    process.symbol("interp_head", PY_RUNTIME);
    let handle = process.handle();

    match list_interpreter_states(&handle) {
        Err(Error::SymbolNotFound(e)) => assert_eq!("_PyRuntime", e.symbol),
        other => panic!("unexpected: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_object_type() {
    const OBJECT: u64 = 0x6000;
    const TYPE: u64 = 0x7000;
    const NAME: u64 = 0x8000;

    let process = FakeProcess::new(3, 7);

    process.alloc(StructKind::PyDictObject, OBJECT);
    process.set(StructKind::PyObject, OBJECT, "ob_refcnt", 2);
    process.set(StructKind::PyObject, OBJECT, "ob_type", TYPE);

    process.alloc(StructKind::PyTypeObject, TYPE);
    process.set(StructKind::PyTypeObject, TYPE, "tp_name", NAME);
    process.set(StructKind::PyTypeObject, TYPE, "tp_basicsize", 48);
    process.set(
        StructKind::PyTypeObject,
        TYPE,
        "tp_flags",
        (TypeFlags::DICT_SUBCLASS | TypeFlags::READY).bits(),
    );

    process.map(NAME, 0x100);
    process.write(NAME, b"dict\0");

    let handle = process.handle();
    let object = handle.struct_proxy::<PyObject>(Address::new(OBJECT));

    assert_eq!(2, object.ob_refcnt().unwrap().read().unwrap());
    assert_eq!("dict", object.type_name().unwrap());
    assert!(object.is_dict().unwrap());

    let ty = object.ob_type().unwrap().deref().unwrap();
    assert_eq!(48, ty.tp_basicsize().unwrap().read().unwrap());
    assert!(!ty
        .tp_flags()
        .unwrap()
        .read()
        .unwrap()
        .contains(TypeFlags::HEAPTYPE));

    // a type object is itself an object.
    let header = ty.ob_base().unwrap().ob_base().unwrap();
    assert_eq!(Address::new(TYPE), header.address());

    let dict = object.cast::<pyproxy::structs::PyDictObject>();
    assert_eq!(object.address(), dict.ob_base().unwrap().address());
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use super::*;

/// Counts how often the engine asks for a unit to be compiled.
struct Counting {
    compiled: Arc<AtomicUsize>,
}

impl CodeGenerator for Counting {
    fn compile(&self, image: &Memory, header: &Header, pc: u32) -> Result<CompiledUnit> {
        self.compiled.fetch_add(1, Ordering::SeqCst);
        ZCodeGenerator.compile(image, header, pc)
    }
}

fn sliced() -> EngineConfig {
    EngineConfig {
        time_slice_ms: 0,
        ..EngineConfig::default()
    }
}

fn busy_loop() -> StoryBuilder {
    StoryBuilder::new().code(&INC_G01).code(&JUMP_BACK_2)
}

#[test]
fn test_tick_when_slice_runs_out() {
    let mut engine = loaded(busy_loop().build(), sliced());
    assert_eq!(engine.handle(Event::Restart).unwrap(), vec![Order::Tick]);
    assert_eq!(read_global(&engine, 1), 1);

    for expected in 2..5 {
        let orders = engine.handle(Event::Resume { result: None }).unwrap();
        assert_eq!(orders, vec![Order::Tick]);
        assert_eq!(read_global(&engine, 1), expected);
    }
}

#[test]
fn test_cached_units_are_reused() {
    let compiled = Arc::new(AtomicUsize::new(0));
    let mut engine = Engine::with_collaborators(
        sliced(),
        Box::new(Counting {
            compiled: compiled.clone(),
        }),
        Box::new(ZsciiText),
        Box::new(BufferedUi::new()),
    );
    let story = busy_loop().build();
    engine.handle(Event::Load { data: story.clone() }).unwrap();
    engine.handle(Event::Restart).unwrap();
    engine.handle(Event::Resume { result: None }).unwrap();
    engine.handle(Event::Resume { result: None }).unwrap();
    assert_eq!(compiled.load(Ordering::SeqCst), 1);
    assert_eq!(engine.cache_stats().hits, 2);

    // same image: restart keeps the compiled units
    engine.handle(Event::Load { data: story }).unwrap();
    engine.handle(Event::Restart).unwrap();
    assert_eq!(compiled.load(Ordering::SeqCst), 1);
    assert_eq!(engine.cache_stats().entries, 1);

    engine
        .handle(Event::Load {
            data: busy_loop().release(2).build(),
        })
        .unwrap();
    assert_eq!(engine.cache_stats().entries, 0);
    engine.handle(Event::Restart).unwrap();
    assert_eq!(compiled.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unit_names_start_instruction() {
    let memory = Memory::new(busy_loop().build());
    let header = Header::parse(&memory).unwrap();
    let unit = ZCodeGenerator.compile(&memory, &header, CODE as u32).unwrap();
    assert_eq!(unit.name.as_deref(), Some("inc@00500"));
    assert_eq!(unit.to_string(), "inc@00500 (0x00500)");
}

#[test]
fn test_undecodable_code_is_a_compile_error() {
    let mut engine = loaded(StoryBuilder::new().code(&[0xBC]).build(), EngineConfig::default());
    let err = engine.handle(Event::Restart).unwrap_err();
    match err.downcast_ref::<VmError>() {
        Some(VmError::Compile { addr, .. }) => assert_eq!(*addr, 0x500),
        other => panic!("expected a compile error, got {:?}", other),
    }
}

#[test]
fn test_division_by_zero_names_instruction() {
    // div 1 0 -> sp
    let mut engine = loaded(
        StoryBuilder::new().code(&[0x17, 0x01, 0x00, 0x00]).build(),
        EngineConfig::default(),
    );
    let err = engine.handle(Event::Restart).unwrap_err();
    assert_eq!(
        err.downcast_ref::<VmError>(),
        Some(&VmError::DivisionByZero { addr: 0x500 })
    );
    assert!(format!("{:#}", err).contains("div@00500"));
}

#[test]
fn test_print_and_new_line() {
    let mut print = vec![0xB2];
    print.extend(zstr("hi"));
    let (_, orders) = started(StoryBuilder::new().code(&print).code(&[NEW_LINE, QUIT]).build());
    assert_eq!(main_text(&orders), "hi\n");
    assert_eq!(orders.last(), Some(&Order::Quit));
}

#[test]
fn test_call_returns_into_store_variable() {
    // call_vs 0x180 7 -> G01; print_num G01; quit
    let story = StoryBuilder::new()
        .routine(0x600, 1, &[0xAB, 0x01])
        .code(&[0xE0, 0x1F, 0x01, 0x80, 0x07, 0x11])
        .code(&[0xE6, 0xBF, 0x11, QUIT])
        .build();
    let (engine, orders) = started(story);
    assert_eq!(main_text(&orders), "7");
    assert_eq!(read_global(&engine, 1), 7);
    let state = &engine.machine().unwrap().state;
    assert!(state.frames().is_empty());
    assert!(state.stack().is_empty());
}

#[test]
fn test_status_line_follows_main_output() {
    let mut code = vec![0xEA, 0x7F, 0x01, 0xEB, 0x7F, 0x01, 0xB2];
    code.extend(zstr("room"));
    code.extend([0xEB, 0x7F, 0x00, 0xB2]);
    code.extend(zstr("x"));
    code.push(QUIT);
    let (_, orders) = started(StoryBuilder::new().code(&code).build());
    assert_eq!(
        orders,
        vec![
            Order::SplitWindow { lines: 1 },
            Order::Stream {
                to: StreamTarget::Main,
                text: "x".into(),
                style: 0,
            },
            Order::Stream {
                to: StreamTarget::Status,
                text: "room".into(),
                style: 0,
            },
            Order::Quit,
        ]
    );
}

#[test]
fn test_output_stream_three_captures_text() {
    // output_stream 3 0x0300; print "ab"; output_stream -3; quit
    let mut code = vec![0xF3, 0x4F, 0x03, 0x03, 0x00, 0xB2];
    code.extend(zstr("ab"));
    code.extend([0xF3, 0x3F, 0xFF, 0xFD, QUIT]);
    let (engine, orders) = started(StoryBuilder::new().code(&code).build());
    assert_eq!(main_text(&orders), "");
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read16(0x300).unwrap(), 2);
    assert_eq!(mem.read_bytes(0x302, 2).unwrap(), b"ab");
}

#[test]
fn test_fatal_error_halts_the_machine() {
    // print "x"; div 1 0 -> sp; quit
    let mut code = vec![0xB2];
    code.extend(zstr("x"));
    code.extend([0x17, 0x01, 0x00, 0x00, QUIT]);
    let mut engine = loaded(StoryBuilder::new().code(&code).build(), EngineConfig::default());

    let err = engine.handle(Event::Restart).unwrap_err();
    assert!(matches!(err.downcast_ref::<VmError>(), Some(VmError::DivisionByZero { .. })));
    assert!(engine.machine().unwrap().is_halted());

    // neither the quit after the failed div nor the pending "x" is delivered
    let err = engine.handle(Event::Resume { result: None }).unwrap_err();
    assert_eq!(err.downcast_ref::<VmError>(), Some(&VmError::Halted));

    let story = StoryBuilder::new().code(&[QUIT]).build();
    engine.handle(Event::Load { data: story }).unwrap();
    assert_eq!(engine.handle(Event::Restart).unwrap(), vec![Order::Quit]);
}

#[test]
fn test_routine_in_dynamic_memory_is_cached_and_run() {
    // call_vs 0x3A0 5 -> G01; quit, with the routine below static memory
    let story = StoryBuilder::new()
        .routine(0x3A0, 1, &[0xAB, 0x01])
        .code(&[0xE0, 0x1F, 0x00, 0xE8, 0x05, 0x11, QUIT])
        .build();
    let (mut engine, orders) = started(story);
    assert_eq!(orders, vec![Order::Quit]);
    assert_eq!(read_global(&engine, 1), 5);
    // caller, routine body, and the return point
    assert_eq!(engine.cache_stats().entries, 3);

    engine.handle(Event::Restart).unwrap();
    assert_eq!(read_global(&engine, 1), 5);
    let stats = engine.cache_stats();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.hits, 3);
}

use super::*;

/// `push 42`
const PUSH_42: [u8; 3] = [0xE8, 0x7F, 0x2A];
/// `save -> G02`
const SAVE: [u8; 4] = [0xBE, 0x00, 0xFF, 0x12];
/// `restore -> G02`
const RESTORE: [u8; 4] = [0xBE, 0x01, 0xFF, 0x12];

fn saving_story() -> StoryBuilder {
    StoryBuilder::new()
        .code(&PUSH_42)
        .code(&SAVE)
        .code(&INC_G01)
        .code(&INC_G01)
        .code(&READ_CHAR)
        .code(&[QUIT])
}

fn restoring_story() -> StoryBuilder {
    StoryBuilder::new()
        .global(2, 5)
        .code(&PUSH_42)
        .code(&RESTORE)
        .code(&READ_CHAR)
        .code(&[QUIT])
}

/// Run the saving story up to its `save` and return the engine and payload.
fn saved() -> (Engine, Vec<u8>) {
    let (engine, mut orders) = started(saving_story().build());
    match orders.pop() {
        Some(Order::Save { data, storer }) => {
            assert_eq!(storer, Some(global(2)));
            (engine, data)
        }
        other => panic!("expected a save order, got {:?}", other),
    }
}

fn restore_with(data: Option<Vec<u8>>) -> Engine {
    let (mut engine, orders) = started(restoring_story().build());
    assert_eq!(
        orders,
        vec![Order::Restore {
            storer: Some(global(2))
        }]
    );
    let orders = engine
        .handle(Event::Restore {
            data,
            storer: Some(global(2)),
        })
        .unwrap();
    assert!(matches!(orders.last(), Some(Order::Char { .. })));
    engine
}

#[test]
fn test_save_then_restore_resumes_after_save() {
    let (mut engine, data) = saved();
    let orders = engine
        .handle(Event::Resume {
            result: Some(StoreResult {
                storer: global(2),
                value: 1,
            }),
        })
        .unwrap();
    assert!(matches!(orders.last(), Some(Order::Char { .. })));
    let machine = engine.machine().unwrap();
    let before = (machine.memory.clone(), machine.state.clone());
    assert_eq!(read_global(&engine, 1), 2);

    let orders = engine
        .handle(Event::Restore {
            data: Some(data),
            storer: Some(global(3)),
        })
        .unwrap();
    assert!(matches!(orders.last(), Some(Order::Char { .. })));
    assert_eq!(read_global(&engine, 2), 2);

    let machine = engine.machine().unwrap();
    let mut expected = before.0;
    expected.write16(GLOBALS + 4, 2).unwrap();
    assert_eq!(machine.memory, expected);
    assert_eq!(machine.state.pc, before.1.pc);
    assert_eq!(machine.state.stack(), &[42]);
    assert_eq!(machine.state.snapshot(), before.1.snapshot());
}

#[test]
fn test_restore_without_data_stores_zero() {
    let engine = restore_with(None);
    let machine = engine.machine().unwrap();
    assert_eq!(read_global(&engine, 2), 0);
    assert_eq!(machine.state.stack(), &[42]);

    // nothing but the result variable moved
    let mut pristine = Memory::new(restoring_story().global(2, 0).build());
    let header = Header::parse(&pristine).unwrap();
    crate::header::write_capabilities(&mut pristine, &header, &EngineConfig::default()).unwrap();
    assert_eq!(machine.memory, pristine);
}

#[test]
fn test_restore_rejects_other_story() {
    let (_, data) = saved();
    let (mut engine, _) = started(restoring_story().release(2).build());
    engine
        .handle(Event::Restore {
            data: Some(data),
            storer: Some(global(2)),
        })
        .unwrap();
    assert_eq!(read_global(&engine, 2), 0);
    assert_eq!(engine.machine().unwrap().state.stack(), &[42]);
}

#[test]
fn test_restore_rejects_garbage() {
    let engine = restore_with(Some(b"not a save file".to_vec()));
    assert_eq!(read_global(&engine, 2), 0);

    let engine = restore_with(Some(Vec::new()));
    assert_eq!(read_global(&engine, 2), 0);
}

#[test]
fn test_undo_round_trip() {
    // save_undo -> G02; read_char; restore_undo -> G04; read_char
    let story = StoryBuilder::new()
        .code(&[0xBE, 0x09, 0xFF, 0x12])
        .code(&READ_CHAR)
        .code(&[0xBE, 0x0A, 0xFF, 0x14])
        .code(&READ_CHAR)
        .code(&[QUIT])
        .build();
    let (mut engine, _) = started(story);
    assert_eq!(read_global(&engine, 2), 1);
    assert_eq!(engine.undo_len(), 1);

    let orders = engine
        .handle(Event::Char {
            key: KeyInput::Char('u'),
            storer: global(3),
        })
        .unwrap();
    assert!(matches!(orders.last(), Some(Order::Char { .. })));
    assert_eq!(read_global(&engine, 2), 2);
    // the key stored after the snapshot is rolled back with it
    assert_eq!(read_global(&engine, 3), 0);
    assert_eq!(read_global(&engine, 4), 0);
    assert_eq!(engine.undo_len(), 0);
}

#[test]
fn test_restore_undo_with_empty_history() {
    // restore_undo -> G04; quit
    let story = StoryBuilder::new()
        .global(4, 9)
        .code(&[0xBE, 0x0A, 0xFF, 0x14, QUIT])
        .build();
    let (engine, orders) = started(story);
    assert_eq!(orders, vec![Order::Quit]);
    assert_eq!(read_global(&engine, 4), 0);
}

#[test]
fn test_restore_undo_reopens_memory_stream() {
    // output_stream 3 0x0300; save_undo -> G02; je G02 2 ?restored;
    // output_stream -3; restore_undo -> G04;
    // restored: print "ab"; output_stream -3; quit
    let mut code = vec![0xF3, 0x4F, 0x03, 0x03, 0x00];
    code.extend([0xBE, 0x09, 0xFF, 0x12]);
    code.extend([0x41, 0x12, 0x02, 0xCA]);
    code.extend([0xF3, 0x3F, 0xFF, 0xFD]);
    code.extend([0xBE, 0x0A, 0xFF, 0x14]);
    code.push(0xB2);
    code.extend(zstr("ab"));
    code.extend([0xF3, 0x3F, 0xFF, 0xFD, QUIT]);

    let (engine, orders) = started(StoryBuilder::new().code(&code).build());
    assert_eq!(orders, vec![Order::Quit]);
    assert_eq!(read_global(&engine, 2), 2);
    let machine = engine.machine().unwrap();
    assert!(!machine.streams.memory_active());
    assert_eq!(machine.memory.read16(0x300).unwrap(), 2);
    assert_eq!(machine.memory.read_bytes(0x302, 2).unwrap(), b"ab");
}

use super::*;

#[test]
fn test_restart_writes_display_header() {
    let (engine, orders) = started(StoryBuilder::new().code(&[QUIT]).build());
    assert_eq!(orders, vec![Order::Quit]);
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read8(offsets::SCREEN_WIDTH).unwrap(), 80);
    assert_eq!(mem.read8(offsets::SCREEN_HEIGHT).unwrap(), 255);
    assert_eq!(mem.read8(offsets::FLAGS1).unwrap(), 0x1D);
    assert_eq!(mem.read8(offsets::STANDARD_REVISION).unwrap(), 1);
    assert_eq!(mem.read8(offsets::STANDARD_REVISION + 1).unwrap(), 0);
    assert_eq!(engine.undo_len(), 0);
}

#[test]
fn test_config_reaches_header() {
    let config = EngineConfig {
        width: 132,
        timed: true,
        security_override: true,
        ..EngineConfig::default()
    };
    let mut engine = loaded(StoryBuilder::new().code(&[QUIT]).build(), config);
    engine.handle(Event::Restart).unwrap();
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read8(offsets::SCREEN_WIDTH).unwrap(), 132);
    assert_eq!(mem.read16(offsets::SCREEN_WIDTH_UNITS).unwrap(), 132);
    assert_eq!(mem.read8(offsets::FLAGS1).unwrap(), 0x9D);
    assert_eq!(mem.read8(offsets::STANDARD_REVISION + 1).unwrap(), 2);
}

#[test]
fn test_event_env_is_merged_before_handling() {
    let mut engine = loaded(StoryBuilder::new().code(&[QUIT]).build(), EngineConfig::default());
    let restart: Envelope = serde_json::from_str(r#"{"code":"restart","env":{"width":64}}"#).unwrap();
    assert_eq!(engine.handle(restart).unwrap(), vec![Order::Quit]);
    assert_eq!(engine.config().width, 64);
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read8(offsets::SCREEN_WIDTH).unwrap(), 64);

    // a patch without a width keeps the merged one
    let restart = Envelope {
        event: Event::Restart,
        env: Some(EnvPatch {
            timed: Some(true),
            undo_depth: Some(2),
            ..EnvPatch::default()
        }),
    };
    engine.handle(restart).unwrap();
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read8(offsets::SCREEN_WIDTH).unwrap(), 64);
    assert_eq!(mem.read8(offsets::FLAGS1).unwrap() & 0x80, 0x80);
    assert_eq!(engine.config().undo_depth, 2);
}

#[test]
fn test_restart_is_idempotent_and_carries_flags2() {
    // storeb 0 0x11 1; quit
    let story = StoryBuilder::new()
        .flags2(0xFF)
        .code(&[0xE2, 0x57, 0x00, 0x11, 0x01, QUIT])
        .build();
    let (mut engine, _) = started(story);
    let first = engine.machine().unwrap().memory.clone();
    assert_eq!(first.read8(offsets::FLAGS2).unwrap(), 0x01);

    engine.handle(Event::Restart).unwrap();
    let second = engine.machine().unwrap().memory.clone();
    assert_eq!(first, second);

    // the story's own 0xFF never comes back once the program has changed the byte
    engine.handle(Event::Restart).unwrap();
    assert_eq!(engine.machine().unwrap().memory.read8(offsets::FLAGS2).unwrap(), 0x01);
}

#[test]
fn test_unsupported_version_commits_nothing() {
    let mut engine = loaded(StoryBuilder::new().version(3).build(), EngineConfig::default());
    let err = engine.handle(Event::Restart).unwrap_err();
    let kind = err.downcast_ref::<VmError>().expect("typed error");
    assert_eq!(kind, &VmError::UnsupportedVersion(3));
    assert!(kind.is_initialization());
    assert!(engine.machine().is_none());
}

#[test]
fn test_failed_restart_keeps_running_machine() {
    let mut engine = loaded(StoryBuilder::new().code(&READ_CHAR).build(), EngineConfig::default());
    engine.handle(Event::Restart).unwrap();
    engine
        .handle(Event::Load {
            data: StoryBuilder::new().version(6).build(),
        })
        .unwrap();
    assert!(engine.handle(Event::Restart).is_err());
    assert_eq!(engine.machine().unwrap().header.version, 5);
}

#[test]
fn test_events_before_start_are_rejected() {
    let mut engine = Engine::default();
    let err = engine.handle(Event::Restart).unwrap_err();
    assert_eq!(err.downcast_ref::<VmError>(), Some(&VmError::NoStory));

    let mut engine = loaded(StoryBuilder::new().build(), EngineConfig::default());
    let err = engine.handle(Event::Resume { result: None }).unwrap_err();
    assert_eq!(err.downcast_ref::<VmError>(), Some(&VmError::NotStarted));
}

#[test]
fn test_quit_halts_until_restart() {
    let (mut engine, orders) = started(StoryBuilder::new().code(&[QUIT]).build());
    assert_eq!(orders.last(), Some(&Order::Quit));
    assert!(engine.machine().unwrap().is_halted());

    let err = engine.handle(Event::Resume { result: None }).unwrap_err();
    assert_eq!(err.downcast_ref::<VmError>(), Some(&VmError::Halted));

    let orders = engine.handle(Event::Restart).unwrap();
    assert_eq!(orders, vec![Order::Quit]);
}

#[test]
fn test_restart_clears_undo_history() {
    // read_char; save_undo -> G02; read_char
    let story = StoryBuilder::new()
        .code(&READ_CHAR)
        .code(&[0xBE, 0x09, 0xFF, 0x12])
        .code(&READ_CHAR)
        .build();
    let (mut engine, _) = started(story);
    assert_eq!(engine.undo_len(), 0);
    engine
        .handle(Event::Char {
            key: KeyInput::Enter,
            storer: global(3),
        })
        .unwrap();
    assert_eq!(engine.undo_len(), 1);
    assert_eq!(read_global(&engine, 2), 1);

    engine.handle(Event::Restart).unwrap();
    assert_eq!(engine.undo_len(), 0);
}

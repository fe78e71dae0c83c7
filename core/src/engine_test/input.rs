use super::*;

fn line(response: &str, len: u8) -> Event {
    Event::Read(LineInput {
        response: response.to_string(),
        terminator: 13,
        buffer: TEXT_BUFFER,
        parse: PARSE_BUFFER,
        len,
        storer: global(0),
    })
}

fn waiting_for_line() -> Engine {
    let (engine, orders) = started(StoryBuilder::new().code(&AREAD).code(&[QUIT]).build());
    assert_eq!(
        orders,
        vec![Order::Read {
            buffer: TEXT_BUFFER,
            parse: PARSE_BUFFER,
            len: 40,
            storer: global(0),
            time: 0,
            routine: 0,
        }]
    );
    engine
}

#[test]
fn test_read_line_echo_and_buffer() {
    let mut engine = waiting_for_line();
    let random_before = engine.machine().unwrap().state.random.clone();

    let orders = engine.handle(line("Hello", 10)).unwrap();
    assert_eq!(
        orders,
        vec![
            Order::Stream {
                to: StreamTarget::Main,
                text: "Hello\n".into(),
                style: 0,
            },
            Order::Quit,
        ]
    );

    let machine = engine.machine().unwrap();
    let buffer = TEXT_BUFFER as usize;
    assert_eq!(machine.memory.read8(buffer + 1).unwrap(), 5);
    assert_eq!(machine.memory.read_bytes(buffer + 2, 5).unwrap(), b"hello");
    assert_eq!(read_global(&engine, 0), 13);
    assert_eq!(machine.state.random, random_before);

    // one unknown word recorded in the parse buffer
    let parse = PARSE_BUFFER as usize;
    assert_eq!(machine.memory.read8(parse + 1).unwrap(), 1);
    assert_eq!(machine.memory.read16(parse + 2).unwrap(), 0);
    assert_eq!(machine.memory.read8(parse + 4).unwrap(), 5);
    assert_eq!(machine.memory.read8(parse + 5).unwrap(), 2);
}

#[test]
fn test_long_line_is_truncated() {
    let mut engine = waiting_for_line();
    let orders = engine.handle(line("Open the Door", 6)).unwrap();
    // the echo is verbatim, only the stored copy is cut
    assert_eq!(main_text(&orders), "Open the Door\n");
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read8(TEXT_BUFFER as usize + 1).unwrap(), 6);
    assert_eq!(mem.read_bytes(TEXT_BUFFER as usize + 2, 6).unwrap(), b"open t");
}

#[test]
fn test_line_without_parse_buffer_skips_tokenising() {
    let mut engine = waiting_for_line();
    let Event::Read(mut input) = line("look", 10) else {
        unreachable!()
    };
    input.parse = 0;
    engine.handle(Event::Read(input)).unwrap();
    let mem = &engine.machine().unwrap().memory;
    assert_eq!(mem.read8(PARSE_BUFFER as usize + 1).unwrap(), 0);
}

#[test]
fn test_char_input_maps_keys() {
    let story = StoryBuilder::new()
        .code(&READ_CHAR)
        .code(&READ_CHAR)
        .code(&[QUIT])
        .build();
    let (mut engine, orders) = started(story);
    assert_eq!(
        orders,
        vec![Order::Char {
            storer: global(3),
            time: 0,
            routine: 0,
        }]
    );
    engine
        .handle(Event::Char {
            key: KeyInput::Char('y'),
            storer: global(3),
        })
        .unwrap();
    assert_eq!(read_global(&engine, 3), b'y' as u16);
    engine
        .handle(Event::Char {
            key: KeyInput::Up,
            storer: global(3),
        })
        .unwrap();
    assert_eq!(read_global(&engine, 3), 129);
}

#[test]
fn test_resume_stores_host_result() {
    let story = StoryBuilder::new()
        .code(&READ_CHAR)
        .code(&READ_CHAR)
        .code(&[QUIT])
        .build();
    let (mut engine, _) = started(story);
    engine
        .handle(Event::Resume {
            result: Some(StoreResult {
                storer: global(7),
                value: 0x1234,
            }),
        })
        .unwrap();
    assert_eq!(read_global(&engine, 7), 0x1234);
}

//! End-to-end behaviour of the port against recording and simulated sinks.

use stamp_core::protocol::{DATA, RUN, SWEEP};
use stamp_core::sim::{SimBoardSpec, SimDriver};
use stamp_core::{
    initialize, CountingDelay, Pace, Port, PortConfig, PortError, RecordingSink, Value,
};

fn port() -> Port<RecordingSink, CountingDelay> {
    Port::new(RecordingSink::new(), CountingDelay::new(), 0).unwrap()
}

#[test]
fn checksum_is_additive_regardless_of_toggle_mask() {
    let words = [0x0001u16, 0xFFFF, 0x8000, 0x1234, 0x0F0F];
    let expected = words.iter().fold(0x0100u16, |sum, &w| sum.wrapping_add(w));

    let mut plain = port();
    let mut toggled = port();
    plain.set_checksum(0x0100);
    toggled.set_checksum(0x0100);
    toggled.toggle_bits_on_post(0xFFFF_FFFF);

    for &word in &words {
        plain.post_int16(word, Pace::Immediate).unwrap();
        toggled.post_int16(word, Pace::Immediate).unwrap();
    }

    assert_eq!(plain.checksum(), expected);
    assert_eq!(toggled.checksum(), expected);
    assert_ne!(plain.sink().writes(), toggled.sink().writes());
}

#[test]
fn int32_matches_two_int16_posts() {
    let value = 0x89AB_CDEFu32;

    let mut whole = port();
    whole.post_int32(value, Pace::Hold).unwrap();

    let mut halves = port();
    halves.post_int16((value & 0xFFFF) as u16, Pace::Hold).unwrap();
    halves.post_int16((value >> 16) as u16, Pace::Hold).unwrap();

    assert_eq!(whole.sink().writes(), halves.sink().writes());
    assert_eq!(whole.checksum(), halves.checksum());
    assert_eq!(whole.register(), halves.register());
    assert_eq!(whole.delay().holds(), 2);
}

#[test]
fn toggle_mask_changes_transmission_but_not_checksum() {
    let mut port = port();
    port.toggle_bits_on_post(0xFF00);
    port.set_checksum(0);
    port.post_int16(1, Pace::Hold).unwrap();

    assert_eq!(port.checksum(), 1);
    assert_eq!(port.register() & 0xFFFF, 1 ^ 0xFF00);
    assert_eq!(port.sink().last(), Some(1 ^ 0xFF00));
}

#[test]
fn encoder_posts_never_touch_status_word() {
    let mut port = port();
    port.set_bits(RUN | SWEEP, Pace::Immediate).unwrap();

    port.post_int16(0xAAAA, Pace::Immediate).unwrap();
    assert_eq!(port.register() & 0xFFFF_0000, RUN | SWEEP);

    port.post_int32(0xFFFF_FFFF, Pace::Immediate).unwrap();
    assert_eq!(port.register() & 0xFFFF_0000, RUN | SWEEP);

    port.post_float(-0.0, Pace::Immediate).unwrap();
    assert_eq!(port.register() & 0xFFFF_0000, RUN | SWEEP);
    for write in port.sink().writes() {
        assert_eq!(write & 0xFFFF_0000, RUN | SWEEP);
    }
}

#[test]
fn toggle_mask_upper_bits_flip_status_word_on_each_post() {
    let mut port = port();
    port.set_bits(RUN, Pace::Immediate).unwrap();
    port.toggle_bits_on_post(DATA);

    port.post_int16(5, Pace::Immediate).unwrap();
    assert_eq!(port.register(), RUN | DATA | 5);
    port.post_int16(6, Pace::Immediate).unwrap();
    assert_eq!(port.register(), RUN | 6);
}

#[test]
fn double_toggle_restores_bits() {
    let mut port = port();
    port.post_int16(0x5A5A, Pace::Immediate).unwrap();
    port.set_bits(SWEEP, Pace::Immediate).unwrap();
    let before = port.register();

    let mask = SWEEP | RUN | 0x00FF;
    port.toggle_bits(mask, Pace::Immediate).unwrap();
    assert_eq!(port.register(), before ^ mask);
    port.toggle_bits(mask, Pace::Immediate).unwrap();
    assert_eq!(port.register(), before);
}

#[test]
fn string_framing() {
    let mut port = port();
    port.set_checksum(0);
    port.post_string(b"AB", 2, Pace::Hold).unwrap();
    let ab = u16::from_le_bytes([b'A', b'B']);
    assert_eq!(port.sink().writes(), &[u32::from(ab)]);
    assert_eq!(port.checksum(), ab);

    let mut port = self::port();
    port.post_string(b"A", 4, Pace::Hold).unwrap();
    assert_eq!(port.sink().writes(), &[u32::from(b'A'), 0]);
    assert_eq!(port.checksum(), u16::from(b'A'));
    assert_eq!(port.delay().holds(), 2);
}

#[test]
fn checksum_reset_starts_new_session() {
    let mut port = port();
    port.post_int32(0x0001_0001, Pace::Immediate).unwrap();
    port.set_checksum(0);

    port.post_value(&Value::Int16(10), Pace::Immediate).unwrap();
    port.post_value(&Value::text("xy", 2).unwrap(), Pace::Immediate).unwrap();
    let expected = 10u16.wrapping_add(u16::from_le_bytes([b'x', b'y']));
    assert_eq!(port.checksum(), expected);
}

#[test]
fn malformed_arguments_leave_state_untouched() {
    let mut port = port();
    port.set_bits(RUN, Pace::Immediate).unwrap();
    port.post_int16(0x0042, Pace::Immediate).unwrap();
    let (register, checksum, writes) = (port.register(), port.checksum(), port.sink().writes().len());

    for token in ["i16:65536", "i32:0x1_0000_0000", "f32:nope", "str:abc:-2", "x:1"] {
        let parsed = token.parse::<Value>();
        assert!(matches!(parsed, Err(PortError::Argument(_))), "{} should be rejected", token);
    }
    assert!(Value::int16_from_i64(-40_000).is_err());
    assert!(port.post_string(b"abc", usize::MAX, Pace::Hold).is_err());

    assert_eq!(port.register(), register);
    assert_eq!(port.checksum(), checksum);
    assert_eq!(port.sink().writes().len(), writes);
    assert_eq!(port.delay().holds(), 0);
}

#[test]
fn write_failure_is_reported_but_state_advances() {
    let mut port = port();
    port.sink_mut().set_failing(Some(-1));
    let err = port.post_int16(9, Pace::Hold).unwrap_err();
    assert!(matches!(err, PortError::HardwareWrite { value: 9, .. }));
    assert_eq!(port.register(), 9);
    assert_eq!(port.checksum(), 9);

    port.sink_mut().set_failing(None);
    port.set_bits(SWEEP, Pace::Hold).unwrap();
    assert_eq!(port.register(), SWEEP | 9);
}

#[test]
fn simulated_board_sees_shifted_values() {
    let mut driver = SimDriver::new(vec![
        SimBoardSpec::new("missing").failing_init(),
        SimBoardSpec::new("DT340"),
    ]);
    let log = driver.log();
    let config = PortConfig { bit_shift: 8, hold_us: 0, ..PortConfig::default() };
    let device = initialize(&mut driver, &config.dout_config()).unwrap();

    let mut port = Port::from_config(device, &config).unwrap();
    port.set_bits(RUN, Pace::Hold).unwrap();
    port.post_int16(0x00FF, Pace::Hold).unwrap();

    assert_eq!(*log.borrow(), vec![RUN << 8, (RUN | 0x00FF) << 8]);
    assert_eq!(port.register(), RUN | 0x00FF);
    port.shutdown().unwrap();
}

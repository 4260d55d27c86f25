//! Key identifiers
//!
//! Recorded key actions store a textual identifier instead of a raw code so
//! profile documents stay readable. Known codes use their Linux input names
//! (`KEY_A`, `KEY_LEFTSHIFT`, ...); anything else round-trips as `KEY_<code>`.

/// Linux input key codes and their identifiers
const KEY_TABLE: &[(u16, &str)] = &[
    (1, "KEY_ESC"),
    (2, "KEY_1"),
    (3, "KEY_2"),
    (4, "KEY_3"),
    (5, "KEY_4"),
    (6, "KEY_5"),
    (7, "KEY_6"),
    (8, "KEY_7"),
    (9, "KEY_8"),
    (10, "KEY_9"),
    (11, "KEY_0"),
    (12, "KEY_MINUS"),
    (13, "KEY_EQUAL"),
    (14, "KEY_BACKSPACE"),
    (15, "KEY_TAB"),
    (16, "KEY_Q"),
    (17, "KEY_W"),
    (18, "KEY_E"),
    (19, "KEY_R"),
    (20, "KEY_T"),
    (21, "KEY_Y"),
    (22, "KEY_U"),
    (23, "KEY_I"),
    (24, "KEY_O"),
    (25, "KEY_P"),
    (26, "KEY_LEFTBRACE"),
    (27, "KEY_RIGHTBRACE"),
    (28, "KEY_ENTER"),
    (29, "KEY_LEFTCTRL"),
    (30, "KEY_A"),
    (31, "KEY_S"),
    (32, "KEY_D"),
    (33, "KEY_F"),
    (34, "KEY_G"),
    (35, "KEY_H"),
    (36, "KEY_J"),
    (37, "KEY_K"),
    (38, "KEY_L"),
    (39, "KEY_SEMICOLON"),
    (40, "KEY_APOSTROPHE"),
    (41, "KEY_GRAVE"),
    (42, "KEY_LEFTSHIFT"),
    (43, "KEY_BACKSLASH"),
    (44, "KEY_Z"),
    (45, "KEY_X"),
    (46, "KEY_C"),
    (47, "KEY_V"),
    (48, "KEY_B"),
    (49, "KEY_N"),
    (50, "KEY_M"),
    (51, "KEY_COMMA"),
    (52, "KEY_DOT"),
    (53, "KEY_SLASH"),
    (54, "KEY_RIGHTSHIFT"),
    (56, "KEY_LEFTALT"),
    (57, "KEY_SPACE"),
    (58, "KEY_CAPSLOCK"),
    (59, "KEY_F1"),
    (60, "KEY_F2"),
    (61, "KEY_F3"),
    (62, "KEY_F4"),
    (63, "KEY_F5"),
    (64, "KEY_F6"),
    (65, "KEY_F7"),
    (66, "KEY_F8"),
    (67, "KEY_F9"),
    (68, "KEY_F10"),
    (87, "KEY_F11"),
    (88, "KEY_F12"),
    (97, "KEY_RIGHTCTRL"),
    (100, "KEY_RIGHTALT"),
    (102, "KEY_HOME"),
    (103, "KEY_UP"),
    (104, "KEY_PAGEUP"),
    (105, "KEY_LEFT"),
    (106, "KEY_RIGHT"),
    (107, "KEY_END"),
    (108, "KEY_DOWN"),
    (109, "KEY_PAGEDOWN"),
    (110, "KEY_INSERT"),
    (111, "KEY_DELETE"),
    (125, "KEY_LEFTMETA"),
    (126, "KEY_RIGHTMETA"),
    (183, "KEY_F13"),
    (184, "KEY_F14"),
];

/// First code of the mouse button range (BTN_MOUSE / BTN_LEFT)
pub const BTN_MOUSE_FIRST: u16 = 0x110;

/// Key code to identifier
pub fn key_name(code: u16) -> String {
    KEY_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("KEY_{}", code))
}

/// Identifier to key code. Accepts table names (case-insensitive) and the
/// numeric `KEY_<code>` fallback form.
pub fn key_code(name: &str) -> Option<u16> {
    let upper = name.trim().to_ascii_uppercase();

    if let Some((code, _)) = KEY_TABLE.iter().find(|(_, n)| *n == upper) {
        return Some(*code);
    }

    upper.strip_prefix("KEY_").and_then(|rest| rest.parse().ok())
}

/// Start of the upper keyboard block (KEY_OK); below it sit the joystick,
/// gamepad and digitizer buttons
const KEY_UPPER_FIRST: u16 = 0x160;
/// One past the upper keyboard block (BTN_TRIGGER_HAPPY)
const KEY_UPPER_END: u16 = 0x2c0;

/// Whether a code is a keyboard key that can be recorded and replayed
pub fn is_keyboard_code(code: u16) -> bool {
    (1..BTN_MOUSE_FIRST).contains(&code) || (KEY_UPPER_FIRST..KEY_UPPER_END).contains(&code)
}

/// Every keyboard code; declared on the uinput device so any recorded
/// key, named or not, can be replayed
pub fn keyboard_key_codes() -> impl Iterator<Item = u16> {
    (1..BTN_MOUSE_FIRST).chain(KEY_UPPER_FIRST..KEY_UPPER_END)
}

/// X11 keysym values for named keys.
const NAMED_KEYSYMS: &[(&str, u32)] = &[
    ("space", 0x0020),
    ("BackSpace", 0xff08),
    ("Tab", 0xff09),
    ("ISO_Left_Tab", 0xfe20),
    ("Return", 0xff0d),
    ("Pause", 0xff13),
    ("Scroll_Lock", 0xff14),
    ("Escape", 0xff1b),
    ("Home", 0xff50),
    ("Left", 0xff51),
    ("Up", 0xff52),
    ("Right", 0xff53),
    ("Down", 0xff54),
    ("Page_Up", 0xff55),
    ("Prior", 0xff55),
    ("Page_Down", 0xff56),
    ("Next", 0xff56),
    ("End", 0xff57),
    ("Print", 0xff61),
    ("Insert", 0xff63),
    ("Menu", 0xff67),
    ("Num_Lock", 0xff7f),
    ("KP_Enter", 0xff8d),
    ("F1", 0xffbe),
    ("F2", 0xffbf),
    ("F3", 0xffc0),
    ("F4", 0xffc1),
    ("F5", 0xffc2),
    ("F6", 0xffc3),
    ("F7", 0xffc4),
    ("F8", 0xffc5),
    ("F9", 0xffc6),
    ("F10", 0xffc7),
    ("F11", 0xffc8),
    ("F12", 0xffc9),
    ("Shift_L", 0xffe1),
    ("Shift_R", 0xffe2),
    ("Control_L", 0xffe3),
    ("Control_R", 0xffe4),
    ("Caps_Lock", 0xffe5),
    ("Alt_L", 0xffe9),
    ("Alt_R", 0xffea),
    ("Super_L", 0xffeb),
    ("Super_R", 0xffec),
    ("ISO_Level3_Shift", 0xfe03),
    ("Delete", 0xffff),
];

/// Offset X11 applies to Unicode codepoints outside Latin-1.
const UNICODE_KEYSYM_BASE: u32 = 0x0100_0000;

/// Resolve a key symbol to its keysym. Named keys come from the table;
/// any single character maps through its codepoint.
pub fn keysym_for(symbol: &str) -> Option<u32> {
    if let Some((_, code)) = NAMED_KEYSYMS.iter().find(|(name, _)| *name == symbol) {
        return Some(*code);
    }

    let mut chars = symbol.chars();
    let (Some(ch), None) = (chars.next(), chars.next()) else {
        return None;
    };
    let cp = u32::from(ch);
    match cp {
        0x20..=0x7e | 0xa0..=0xff => Some(cp),
        _ if ch.is_control() => None,
        _ => Some(UNICODE_KEYSYM_BASE + cp),
    }
}

/// Inverse of the named table, used when a listener only knows the keysym.
pub fn symbol_for(keysym: u32) -> Option<&'static str> {
    NAMED_KEYSYMS
        .iter()
        .find(|(_, code)| *code == keysym)
        .map(|(name, _)| *name)
}

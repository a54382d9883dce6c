//! # Virtual Keyboard
//!
//! A uinput device that exposes exactly the keys named in the configuration.
//! Key names are the kernel's (`KEY_A`, `KEY_SPACE`, `BTN_LEFT`, ...),
//! including the alternate spellings kernel headers define for shared codes.

use std::collections::HashMap;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use once_cell::sync::Lazy;
use pitchcon_core::{DeviceError, EventSink};

/// Name the virtual device registers under.
const DEVICE_NAME: &str = "Pitchcon";

/// One past the highest key code the kernel defines (KEY_MAX is 0x2ff).
const KEY_CODE_LIMIT: u16 = 0x300;

/// Kernel names that share a code with another name. `Key`'s `Debug` output
/// only ever yields one name per code, so both spellings are listed here.
const ALIASES: [(&str, u16); 29] = [
    ("KEY_HANGEUL", 122),
    ("KEY_HANGUEL", 122),
    ("KEY_COFFEE", 152),
    ("KEY_SCREENLOCK", 152),
    ("KEY_DIRECTION", 153),
    ("KEY_ROTATE_DISPLAY", 153),
    ("KEY_BRIGHTNESS_AUTO", 244),
    ("KEY_BRIGHTNESS_ZERO", 244),
    ("KEY_WWAN", 246),
    ("KEY_WIMAX", 246),
    ("BTN_MISC", 0x100),
    ("BTN_0", 0x100),
    ("BTN_MOUSE", 0x110),
    ("BTN_LEFT", 0x110),
    ("BTN_JOYSTICK", 0x120),
    ("BTN_TRIGGER", 0x120),
    ("BTN_GAMEPAD", 0x130),
    ("BTN_SOUTH", 0x130),
    ("BTN_A", 0x130),
    ("BTN_EAST", 0x131),
    ("BTN_B", 0x131),
    ("BTN_NORTH", 0x133),
    ("BTN_X", 0x133),
    ("BTN_WEST", 0x134),
    ("BTN_Y", 0x134),
    ("BTN_DIGI", 0x140),
    ("BTN_TOOL_PEN", 0x140),
    ("BTN_WHEEL", 0x150),
    ("BTN_GEAR_DOWN", 0x150),
];

static KEY_NAMES: Lazy<HashMap<String, Key>> = Lazy::new(|| {
    let mut names: HashMap<String, Key> = (0..KEY_CODE_LIMIT)
        .map(Key::new)
        .map(|key| (format!("{key:?}"), key))
        .filter(|(name, _)| name.starts_with("KEY_") || name.starts_with("BTN_"))
        .collect();
    for (name, code) in ALIASES {
        names.insert(name.to_string(), Key::new(code));
    }
    names
});

/// Resolves a kernel key name such as `"KEY_A"`.
pub fn parse_key(name: &str) -> Option<Key> {
    KEY_NAMES.get(name).copied()
}

pub struct VirtualKeyboard {
    device: VirtualDevice,
}

impl VirtualKeyboard {
    /// Creates the uinput device with the given keys enabled.
    pub fn create(keys: impl IntoIterator<Item = Key>) -> Result<Self, DeviceError> {
        let mut key_set = AttributeSet::<Key>::new();
        for key in keys {
            key_set.insert(key);
        }

        let device = VirtualDeviceBuilder::new()?
            .name(DEVICE_NAME)
            .with_keys(&key_set)?
            .build()?;
        log::info!("Created virtual keyboard `{}`", DEVICE_NAME);

        Ok(Self { device })
    }
}

impl EventSink<Key> for VirtualKeyboard {
    fn apply(&mut self, key: Key, pressed: bool) -> Result<(), DeviceError> {
        let event = InputEvent::new(EventType::KEY, key.code(), i32::from(pressed));
        self.device.emit(&[event])?;
        Ok(())
    }
}

use std::{collections::BTreeMap, error::Error, fmt};

use dynamite_system_dispatch::Key;

/// Script replayed when no key file is supplied: fetch a bomb and drop it.
pub(crate) const BUILTIN_SCRIPT: &str = "\
# frame verb key
1 tap a
2 tap enter
3 tap d
4 tap b
";

/// Raw key transition scheduled for a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyStep {
    /// The key goes down.
    Press(Key),
    /// The key goes up.
    Release(Key),
}

/// Key transitions indexed by the frame they are delivered on.
///
/// One instruction per line: `<frame> <press|release|tap> <key>`. Blank lines
/// and lines starting with `#` are skipped. `tap` presses and releases the key
/// within the same frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct KeyScript {
    steps: BTreeMap<u32, Vec<KeyStep>>,
}

impl KeyScript {
    /// Parses a script from its textual form.
    pub(crate) fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut steps: BTreeMap<u32, Vec<KeyStep>> = BTreeMap::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            let (Some(frame), Some(verb), Some(key), None) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                return Err(ScriptError::MalformedLine(line));
            };

            let frame = frame
                .parse::<u32>()
                .map_err(|_| ScriptError::InvalidFrame {
                    line,
                    value: frame.to_owned(),
                })?;
            let key = parse_key(key).ok_or_else(|| ScriptError::UnknownKey {
                line,
                name: key.to_owned(),
            })?;

            let entry = steps.entry(frame).or_default();
            match verb.to_ascii_lowercase().as_str() {
                "press" => entry.push(KeyStep::Press(key)),
                "release" => entry.push(KeyStep::Release(key)),
                "tap" => entry.extend([KeyStep::Press(key), KeyStep::Release(key)]),
                _ => {
                    return Err(ScriptError::UnknownVerb {
                        line,
                        verb: verb.to_owned(),
                    })
                }
            }
        }

        Ok(Self { steps })
    }

    /// Transitions delivered on `frame`, in script order.
    pub(crate) fn at(&self, frame: u32) -> &[KeyStep] {
        self.steps.get(&frame).map_or(&[][..], Vec::as_slice)
    }

    /// Number of transitions in the script.
    pub(crate) fn transitions(&self) -> usize {
        self.steps.values().map(Vec::len).sum()
    }
}

fn parse_key(name: &str) -> Option<Key> {
    let key = match name.to_ascii_lowercase().as_str() {
        "w" => Key::W,
        "a" => Key::A,
        "s" => Key::S,
        "d" => Key::D,
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "space" => Key::Space,
        "enter" | "return" => Key::Enter,
        "b" => Key::B,
        "l" => Key::L,
        "r" => Key::R,
        "escape" | "esc" => Key::Escape,
        _ => return None,
    };
    Some(key)
}

/// Errors raised while parsing a key script.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ScriptError {
    /// The line does not hold exactly three fields.
    MalformedLine(usize),
    /// The frame number is not a non-negative integer.
    InvalidFrame {
        /// One-based line number.
        line: usize,
        /// Offending field.
        value: String,
    },
    /// The verb is neither `press`, `release` nor `tap`.
    UnknownVerb {
        /// One-based line number.
        line: usize,
        /// Offending field.
        verb: String,
    },
    /// The key name is not recognised.
    UnknownKey {
        /// One-based line number.
        line: usize,
        /// Offending field.
        name: String,
    },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine(line) => {
                write!(f, "line {line}: expected `<frame> <verb> <key>`")
            }
            Self::InvalidFrame { line, value } => {
                write!(f, "line {line}: '{value}' is not a frame number")
            }
            Self::UnknownVerb { line, verb } => write!(f, "line {line}: unknown verb '{verb}'"),
            Self::UnknownKey { line, name } => write!(f, "line {line}: unknown key '{name}'"),
        }
    }
}

impl Error for ScriptError {}

//! Rules a demo's contents are checked against.
//!
//! Whitelists are plain text, one rule per line, and are read once at startup. Everything in
//! here works on already loaded text; reading the files is up to the caller.

use hashbrown::HashSet;
use log::warn;

/// File extensions never reported in file checksums.
pub const IGNORED_FILE_EXTENSIONS: &[&str] = &[".dll", ".so", ".bsp"];
/// DLC folders whose `.vpk` archives differ between otherwise identical installs.
pub const IGNORED_VPK_PREFIXES: &[&str] = &["./portal2_dlc1/", "./portal2_dlc2/"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvarCheck {
    IntEquals(i64),
    /// Inclusive on both ends.
    IntRange(i64, i64),
    StrEquals(&'static str),
}

impl CvarCheck {
    pub fn matches(&self, value: &str) -> bool {
        match *self {
            CvarCheck::IntEquals(expected) => parse_int_prefix(value) == Some(expected),
            CvarCheck::IntRange(min, max) => {
                parse_int_prefix(value).is_some_and(|v| (min..=max).contains(&v))
            }
            CvarCheck::StrEquals(expected) => value == expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinCvarRule {
    pub name: &'static str,
    pub check: CvarCheck,
}

/// Cvar values that are always accepted, regardless of whitelist contents.
///
/// A cvar named here is judged by its rule alone; the whitelist is never consulted for it.
pub const BUILTIN_CVAR_RULES: &[BuiltinCvarRule] = &[
    BuiltinCvarRule {
        name: "host_timescale",
        check: CvarCheck::IntEquals(1),
    },
    BuiltinCvarRule {
        name: "sv_cheats",
        check: CvarCheck::IntEquals(0),
    },
    BuiltinCvarRule {
        name: "host_framerate",
        check: CvarCheck::IntEquals(0),
    },
    BuiltinCvarRule {
        name: "cl_fov",
        check: CvarCheck::IntRange(45, 140),
    },
    BuiltinCvarRule {
        name: "m_yaw",
        check: CvarCheck::StrEquals("0.022"),
    },
    BuiltinCvarRule {
        name: "m_pitch",
        check: CvarCheck::StrEquals("0.022"),
    },
];

/// Verdict of the first built-in rule for `name`, or `None` if no built-in rule covers it.
pub fn builtin_cvar_verdict(name: &str, value: &str) -> Option<bool> {
    BUILTIN_CVAR_RULES
        .iter()
        .find(|rule| rule.name == name)
        .map(|rule| rule.check.matches(value))
}

/// Integer prefix of `value`: optional sign, then digits, anything after is ignored.
fn parse_int_prefix(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (sign, digits) = match value.as_bytes().first() {
        Some(b'-') => (-1, &value[1..]),
        Some(b'+') => (1, &value[1..]),
        _ => (1, value),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}

pub fn is_file_ignored(path: &str) -> bool {
    if IGNORED_FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }

    path.ends_with(".vpk") && IGNORED_VPK_PREFIXES.iter().any(|p| path.starts_with(p))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvarRule {
    pub name: String,
    /// `None` accepts any value.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRule {
    pub path: String,
    pub value: Option<String>,
}

impl FileRule {
    pub fn is_comment(&self) -> bool {
        self.path.is_empty() || self.path.starts_with("//")
    }

    fn matches(&self, path: &str, sum: u32) -> bool {
        if self.is_comment() || self.path != path {
            return false;
        }

        self.value
            .as_deref()
            .and_then(parse_hex)
            .is_some_and(|expected| expected == sum)
    }
}

fn parse_hex(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}

fn split_rule(line: &str) -> (String, Option<String>) {
    match line.split_once(' ') {
        Some((key, value)) => (key.to_owned(), Some(value.to_owned())),
        None => (line.to_owned(), None),
    }
}

fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(|line| line.trim_end_matches('\r'))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    pub checksums: HashSet<u32>,
    pub commands: Vec<String>,
    pub cvars: Vec<CvarRule>,
    pub files: Vec<FileRule>,
}

impl Whitelist {
    pub fn new() -> Self {
        Whitelist::default()
    }

    /// Build a whitelist from the text of its four rule files.
    pub fn from_sources(checksums: &str, commands: &str, cvars: &str, files: &str) -> Self {
        Whitelist {
            checksums: Self::parse_checksums(checksums),
            commands: Self::parse_commands(commands),
            cvars: Self::parse_cvars(cvars),
            files: Self::parse_files(files),
        }
    }

    /// One hexadecimal checksum per line.
    pub fn parse_checksums(text: &str) -> HashSet<u32> {
        content_lines(text)
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let parsed = parse_hex(line);
                if parsed.is_none() {
                    warn!("Ignoring malformed checksum whitelist entry `{line}`");
                }
                parsed
            })
            .collect()
    }

    /// One allowed command prefix per line.
    pub fn parse_commands(text: &str) -> Vec<String> {
        content_lines(text)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// `name value` per line; the value is optional.
    pub fn parse_cvars(text: &str) -> Vec<CvarRule> {
        content_lines(text)
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (name, value) = split_rule(line);
                CvarRule { name, value }
            })
            .collect()
    }

    /// `path value` per line. Blank and `//` lines are kept as comments, value and all.
    pub fn parse_files(text: &str) -> Vec<FileRule> {
        content_lines(text)
            .map(|line| {
                let (path, value) = split_rule(line);
                FileRule { path, value }
            })
            .collect()
    }

    pub fn is_checksum_allowed(&self, checksum: u32) -> bool {
        self.checksums.contains(&checksum)
    }

    pub fn is_command_allowed(&self, command: &str) -> bool {
        self.commands
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
    }

    /// Built-in rules first; only cvars they do not cover fall through to the whitelist.
    pub fn is_cvar_allowed(&self, name: &str, value: &str) -> bool {
        builtin_cvar_verdict(name, value).unwrap_or_else(|| {
            self.cvars.iter().any(|rule| {
                rule.name == name && rule.value.as_deref().is_none_or(|v| v == value)
            })
        })
    }

    pub fn is_file_allowed(&self, path: &str, sum: u32) -> bool {
        self.files.iter().any(|rule| rule.matches(path, sum))
    }
}

//! Line-oriented `[Section]` / `key = value` profile files.
//!
//! Profiles are written append-only: every save adds a fresh section at the
//! end of the file, so lookups return the last occurrence of a key.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub section: String,
    pub key: String,
    pub value: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    entries: Vec<ProfileEntry>,
}

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Profile {
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut section = String::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('[') {
                match rest.strip_suffix(']') {
                    Some(name) => section = name.trim().to_string(),
                    None => log::warn!("profile line {line}: unterminated section header"),
                }
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                log::warn!("profile line {line}: expected 'key = value', skipping");
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                log::warn!("profile line {line}: empty key, skipping");
                continue;
            }
            entries.push(ProfileEntry {
                section: section.clone(),
                key: key.to_string(),
                value: value.trim().to_string(),
                line,
            });
        }
        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn section<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ProfileEntry> + 'a {
        self.entries.iter().filter(move |e| e.section == name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).next().is_some()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.section == section && e.key == key)
            .map(|e| e.value.as_str())
    }
}

impl FromStr for Profile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Reads a single value out of a profile file.
pub fn read_token<P: AsRef<Path>>(
    path: P,
    section: &str,
    key: &str,
) -> Result<Option<String>, ProfileError> {
    let profile = Profile::load(path)?;
    Ok(profile.get(section, key).map(str::to_string))
}

/// Appends sections to a profile file without touching what is already there.
pub struct ProfileWriter {
    out: BufWriter<File>,
}

impl ProfileWriter {
    pub fn append<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    pub fn section(&mut self, name: &str) -> std::io::Result<()> {
        writeln!(self.out, "\n[{name}]")
    }

    pub fn entry(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        writeln!(self.out, "{key} = {value}")
    }

    pub fn finish(mut self) -> Result<(), ProfileError> {
        self.out.flush()?;
        Ok(())
    }
}

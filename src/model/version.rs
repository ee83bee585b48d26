// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dotted version numbers as used by build files

use std::cmp::Ordering;
use std::fmt;

/// A `major.minor[.build[.revision]]` version.
///
/// Missing trailing components compare as zero, so `1.2` equals `1.2.0`.
/// Prerelease and build-metadata suffixes (`-preview`, `+sha`) and a leading
/// `v` are ignored when parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersion {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Build component, if written
    pub build: Option<u64>,
    /// Revision component, if written
    pub revision: Option<u64>,
}

impl BuildVersion {
    /// Parse a version, returning `None` when the text is not a version
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let core = trimmed
            .split(['-', '+'])
            .next()
            .unwrap_or_default();
        if core.is_empty() {
            return None;
        }

        let parts = core
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        match parts.as_slice() {
            [major] => Some(Self::new(*major, 0, None, None)),
            [major, minor] => Some(Self::new(*major, *minor, None, None)),
            [major, minor, build] => Some(Self::new(*major, *minor, Some(*build), None)),
            [major, minor, build, revision] => {
                Some(Self::new(*major, *minor, Some(*build), Some(*revision)))
            }
            _ => None,
        }
    }

    /// Create a version from its components
    pub fn new(major: u64, minor: u64, build: Option<u64>, revision: Option<u64>) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Build component, or -1 when it was not written
    pub fn build_or_undefined(&self) -> f64 {
        self.build.map(|b| b as f64).unwrap_or(-1.0)
    }

    /// Revision component, or -1 when it was not written
    pub fn revision_or_undefined(&self) -> f64 {
        self.revision.map(|r| r as f64).unwrap_or(-1.0)
    }

    fn key(&self) -> [u64; 4] {
        [
            self.major,
            self.minor,
            self.build.unwrap_or(0),
            self.revision.unwrap_or(0),
        ]
    }
}

impl PartialOrd for BuildVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BuildVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{build}")?;
            if let Some(revision) = self.revision {
                write!(f, ".{revision}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(
            BuildVersion::parse("v8.0.100-preview.1"),
            Some(BuildVersion::new(8, 0, Some(100), None))
        );
        assert_eq!(BuildVersion::parse("17"), Some(BuildVersion::new(17, 0, None, None)));
        assert_eq!(BuildVersion::parse("1.x"), None);
        assert_eq!(BuildVersion::parse(""), None);
    }

    #[test]
    fn test_ordering_pads_with_zero() {
        let a = BuildVersion::parse("1.2").unwrap();
        let b = BuildVersion::parse("1.2.0.0").unwrap();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert!(BuildVersion::parse("1.10").unwrap() > BuildVersion::parse("1.9.9").unwrap());
        assert_eq!(b.to_string(), "1.2.0.0");
    }
}

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;

/// Independent contexts a profile is presented in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Section {
    Job,
    Mentorship,
    Networking,
    Meet,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Job,
        Section::Mentorship,
        Section::Networking,
        Section::Meet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Job => "job",
            Section::Mentorship => "mentorship",
            Section::Networking => "networking",
            Section::Meet => "meet",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" => Ok(Section::Job),
            "mentorship" => Ok(Section::Mentorship),
            "networking" => Ok(Section::Networking),
            "meet" => Ok(Section::Meet),
            other => Err(ModelError::InvalidSection(other.to_string())),
        }
    }
}

/// Per-section "primary photo" flags carried by every photo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SectionFlags {
    pub job: bool,
    pub mentorship: bool,
    pub networking: bool,
    pub meet: bool,
}

impl SectionFlags {
    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Job => self.job,
            Section::Mentorship => self.mentorship,
            Section::Networking => self.networking,
            Section::Meet => self.meet,
        }
    }

    pub fn set(&mut self, section: Section, value: bool) {
        match section {
            Section::Job => self.job = value,
            Section::Mentorship => self.mentorship = value,
            Section::Networking => self.networking = value,
            Section::Meet => self.meet = value,
        }
    }

    pub fn with(mut self, section: Section, value: bool) -> Self {
        self.set(section, value);
        self
    }
}

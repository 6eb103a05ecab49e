use std::fs;
use std::path::Path;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use tracing::{info, warn};

use crate::error::AppError;

/// One loaded challenge. Numbers are assigned from the sorted filename
/// order, so gaps in the on-disk numbering scheme never show up in the
/// numbers teams see.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub number: u32,
    pub title: String,
    pub markdown: String,
}

/// The full challenge sequence for the event. Loaded once at startup
/// and immutable afterwards.
#[derive(Debug, Default)]
pub struct ChallengeSet {
    challenges: Vec<Challenge>,
}

impl ChallengeSet {
    /// Scans `dir` for files named `challenge-<digits>.md` and loads
    /// them in sorted filename order. A missing directory yields an
    /// empty set with a warning, not a startup failure.
    pub fn load(dir: &Path) -> Result<Self, AppError> {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Challenge directory not found, loading no challenges");
            return Ok(ChallengeSet::default());
        }

        let pattern = Regex::new(r"^challenge-\d+\.md$").unwrap();
        let mut filenames = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_file() && pattern.is_match(&name) {
                filenames.push(name);
            }
        }
        filenames.sort();

        let mut challenges = Vec::with_capacity(filenames.len());
        for (index, name) in filenames.iter().enumerate() {
            let number = index as u32 + 1;
            let markdown = fs::read_to_string(dir.join(name))?;
            let title =
                first_heading(&markdown).unwrap_or_else(|| format!("Challenge {}", number));
            challenges.push(Challenge {
                number,
                title,
                markdown,
            });
        }

        info!(
            count = challenges.len(),
            dir = %dir.display(),
            "Loaded challenges"
        );
        Ok(ChallengeSet { challenges })
    }

    pub fn from_challenges(challenges: Vec<Challenge>) -> Self {
        ChallengeSet { challenges }
    }

    pub fn total(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&Challenge> {
        self.challenges.get(number.checked_sub(1)? as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.iter()
    }
}

/// Plain text of the first markdown heading, if any.
fn first_heading(markdown: &str) -> Option<String> {
    let mut in_heading = false;
    let mut title = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) => in_heading = true,
            Event::End(TagEnd::Heading(_)) => {
                let trimmed = title.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                in_heading = false;
                title.clear();
            }
            Event::Text(text) | Event::Code(text) if in_heading => title.push_str(&text),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::challenges::ChallengeSet;

    fn write_challenge(dir: &TempDir, filename: &str, markdown: &str) {
        fs::write(dir.path().join(filename), markdown).expect("Failed to write challenge file");
    }

    #[test]
    fn test_loads_sorted_and_renumbers_gaps() {
        let dir = TempDir::new().expect("Failed to create challenge dir");
        write_challenge(&dir, "challenge-001.md", "# One\n");
        write_challenge(&dir, "challenge-002.md", "# Two\n");
        write_challenge(&dir, "challenge-004.md", "# Four On Disk\n");
        write_challenge(&dir, "README.md", "# Not a challenge\n");
        write_challenge(&dir, "challenge-abc.md", "# Not a challenge\n");
        write_challenge(&dir, "notes.txt", "scratch\n");
        fs::create_dir(dir.path().join("challenge-099.md"))
            .expect("Failed to create decoy directory");

        let set = ChallengeSet::load(dir.path()).expect("Failed to load challenges");

        assert_eq!(set.total(), 3);
        let numbers: Vec<u32> = set.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        // The file numbered 004 on disk becomes challenge 3.
        let third = set.get(3).expect("Challenge 3 is missing");
        assert_eq!(third.title, "Four On Disk");
    }

    #[test]
    fn test_title_extraction() {
        let dir = TempDir::new().expect("Failed to create challenge dir");
        write_challenge(&dir, "challenge-001.md", "# First Steps\n\nBody.\n");
        write_challenge(&dir, "challenge-002.md", "## Deploy the `portal`\n");
        write_challenge(&dir, "challenge-003.md", "No heading here, just prose.\n");
        write_challenge(
            &dir,
            "challenge-004.md",
            "An intro paragraph first.\n\n# Late Heading\n",
        );
        write_challenge(&dir, "challenge-005.md", "#\n\n## Real Title\n");

        let set = ChallengeSet::load(dir.path()).expect("Failed to load challenges");

        let titles: Vec<&str> = set.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "First Steps",
                "Deploy the portal",
                "Challenge 3",
                "Late Heading",
                "Real Title",
            ]
        );
    }

    #[test]
    fn test_missing_directory_loads_empty() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let set =
            ChallengeSet::load(&dir.path().join("missing")).expect("Failed to load challenges");
        assert!(set.is_empty());
        assert_eq!(set.total(), 0);
    }

    #[test]
    fn test_get_is_one_indexed() {
        let dir = TempDir::new().expect("Failed to create challenge dir");
        write_challenge(&dir, "challenge-001.md", "# One\n");
        write_challenge(&dir, "challenge-002.md", "# Two\n");

        let set = ChallengeSet::load(dir.path()).expect("Failed to load challenges");

        assert!(set.get(0).is_none());
        assert_eq!(set.get(1).expect("Challenge 1 is missing").title, "One");
        assert_eq!(set.get(2).expect("Challenge 2 is missing").title, "Two");
        assert!(set.get(3).is_none());
    }
}

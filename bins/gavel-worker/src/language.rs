use std::fmt;

/// The closed set of runnable languages and their execution images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Cpp,
}

impl Language {
    /// Resolve a job's language tag. An unknown tag is not an error at
    /// this level; the engine turns it into an `UnsupportedLanguage`
    /// verdict before anything is provisioned.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "cpp" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn image(&self) -> &'static str {
        match self {
            Language::Python => "python:3.10-slim",
            Language::Cpp => "gcc:latest",
        }
    }

    pub fn source_file(&self) -> &'static str {
        match self {
            Language::Python => "main.py",
            Language::Cpp => "main.cpp",
        }
    }

    /// Command run inside the container, with the scratch workspace as
    /// the working directory.
    pub fn run_command(&self) -> Vec<String> {
        match self {
            Language::Python => vec!["python".to_string(), "main.py".to_string()],
            Language::Cpp => vec![
                "sh".to_string(),
                "-c".to_string(),
                "g++ -O2 -o a.out main.cpp && ./a.out".to_string(),
            ],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Python => "python",
            Language::Cpp => "cpp",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_resolve() {
        assert_eq!(Language::from_tag("python"), Some(Language::Python));
        assert_eq!(Language::from_tag("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_tag("Python"), Some(Language::Python));
    }

    #[test]
    fn unknown_tags_do_not_resolve() {
        assert_eq!(Language::from_tag("java"), None);
        assert_eq!(Language::from_tag(""), None);
        assert_eq!(Language::from_tag("python3"), None);
    }

    #[test]
    fn source_file_matches_run_command() {
        assert!(Language::Python
            .run_command()
            .contains(&Language::Python.source_file().to_string()));
        assert_eq!(Language::Cpp.source_file(), "main.cpp");
    }
}

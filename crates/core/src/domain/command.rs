// Command - one opaque shell line from the input file

use std::fmt;

/// One shell-executable unit of work
///
/// The text is passed to the shell verbatim; `index` is the position among
/// the non-blank input lines (0-based).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    index: usize,
    line: String,
}

impl Command {
    pub fn new(index: usize, line: impl Into<String>) -> Self {
        Self {
            index,
            line: line.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Parse command file contents into commands
///
/// Each line is trimmed; blank and whitespace-only lines are skipped and do
/// not consume an index.
pub fn parse_commands(input: &str) -> Vec<Command> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| Command::new(index, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines() {
        let input = "echo one\n\n   \necho two\n\t\necho three\n";
        let commands = parse_commands(input);

        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].as_str(), "echo one");
        assert_eq!(commands[2].as_str(), "echo three");
        assert_eq!(commands[2].index(), 2);
    }

    #[test]
    fn test_parse_trims_and_keeps_shell_syntax() {
        let input = "  cd /data/run_07 && unwrap.py -i 'a b' > log.txt 2>&1  \r\n";
        let commands = parse_commands(input);

        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].as_str(),
            "cd /data/run_07 && unwrap.py -i 'a b' > log.txt 2>&1"
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_commands("").is_empty());
        assert!(parse_commands("\n \n\t\n").is_empty());
    }
}

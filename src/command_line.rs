// src/command_line.rs

//! Splitting a command string into program and arguments.
//!
//! Whitespace separates arguments; single or double quotes group text
//! (including whitespace) into one argument. There are no escape sequences,
//! and no variable or glob expansion: this is not a shell.

use crate::errors::{Result, ShellError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InSingle,
    InDouble,
}

/// Split `line` into arguments. Fails on an unbalanced quote.
///
/// ```
/// use procpump::command_line::split_command_line;
///
/// let args = split_command_line(r#"grep -e "two words" 'it''s'"#).unwrap();
/// assert_eq!(args, vec!["grep", "-e", "two words", "its"]);
/// ```
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    // Distinguishes `""` (an empty argument) from no argument at all.
    let mut in_token = false;
    let mut state = State::Normal;

    for c in line.chars() {
        match state {
            State::InSingle => {
                if c == '\'' {
                    state = State::Normal;
                } else {
                    current.push(c);
                }
            }
            State::InDouble => {
                if c == '"' {
                    state = State::Normal;
                } else {
                    current.push(c);
                }
            }
            State::Normal => match c {
                '\'' => {
                    state = State::InSingle;
                    in_token = true;
                }
                '"' => {
                    state = State::InDouble;
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        args.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if state != State::Normal {
        return Err(ShellError::InvalidCommandLine(format!(
            "unbalanced quotes in {line:?}"
        )));
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            split_command_line("  ls   -la\t/tmp \n").unwrap(),
            vec!["ls", "-la", "/tmp"]
        );
    }

    #[test]
    fn quotes_group_and_nest_the_other_kind() {
        assert_eq!(
            split_command_line(r#"echo "it's here" 'say "hi"'"#).unwrap(),
            vec!["echo", "it's here", r#"say "hi""#]
        );
    }

    #[test]
    fn empty_quotes_make_an_empty_argument() {
        assert_eq!(split_command_line(r#"printf "" x"#).unwrap(), vec!["printf", "", "x"]);
    }

    #[test]
    fn adjacent_quoted_parts_join() {
        assert_eq!(split_command_line(r#"a"b c"'d'"#).unwrap(), vec!["ab cd"]);
    }

    #[test]
    fn blank_line_has_no_arguments() {
        assert!(split_command_line("   ").unwrap().is_empty());
    }

    #[test]
    fn unbalanced_quote_is_an_error() {
        let err = split_command_line(r#"echo "oops"#).unwrap_err();
        assert!(matches!(err, ShellError::InvalidCommandLine(_)));
        assert!(split_command_line("echo 'oops").is_err());
    }
}

//! Quote-aware command line tokenizer.
//!
//! Quotes only group characters (including spaces) into a single token.
//! There is no backslash escaping and no expansion of any kind.

use serde::Serialize;

/// A command line split into a program and its arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCommand {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
}

/// Split `input` into tokens.
///
/// A quoted empty string (`''` or `""`) yields an empty token. An unclosed
/// quote runs to the end of input.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Tracks whether a quote pair was seen, so `''` still produces a token.
    let mut pending = false;
    let mut state = LexState::Normal;

    for c in input.chars() {
        match (state, c) {
            (LexState::Normal, '\'') => {
                state = LexState::InSingleQuote;
                pending = true;
            }
            (LexState::Normal, '"') => {
                state = LexState::InDoubleQuote;
                pending = true;
            }
            (LexState::Normal, c) if c.is_whitespace() => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            (LexState::InSingleQuote, '\'') | (LexState::InDoubleQuote, '"') => {
                state = LexState::Normal;
            }
            (_, c) => {
                current.push(c);
                pending = true;
            }
        }
    }

    if pending {
        tokens.push(current);
    }

    tokens
}

/// Tokenize a command line into a [`ParsedCommand`].
///
/// Leading and trailing whitespace is ignored. Empty input parses to an
/// empty program with no arguments.
pub fn parse_command(input: &str) -> ParsedCommand {
    let mut tokens = tokenize(input.trim()).into_iter();
    ParsedCommand {
        program: tokens.next().unwrap_or_default(),
        args: tokens.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_whitespace() {
        assert_eq!(tokenize("git   status\t--short"), vec!["git", "status", "--short"]);
    }

    #[test]
    fn test_quotes_group_embedded_spaces() {
        let double = parse_command("echo \"hello world\"");
        let single = parse_command("echo 'hello world'");

        assert_eq!(double.program, "echo");
        assert_eq!(double.args, vec!["hello world"]);
        assert_eq!(single, double);
    }

    #[test]
    fn test_quotes_join_adjacent_text() {
        assert_eq!(tokenize("--name='a b'c"), vec!["--name=a bc"]);
    }

    #[test]
    fn test_other_quote_is_literal_inside_quotes() {
        assert_eq!(tokenize("say \"it's\" 'a \"b\"'"), vec!["say", "it's", "a \"b\""]);
    }

    #[test]
    fn test_empty_quotes_yield_empty_token() {
        assert_eq!(tokenize("cmd '' x"), vec!["cmd", "", "x"]);
    }

    #[test]
    fn test_backslash_is_not_an_escape() {
        assert_eq!(tokenize(r"a\ b"), vec![r"a\", "b"]);
    }

    #[test]
    fn test_unclosed_quote_runs_to_end() {
        assert_eq!(tokenize("echo 'abc def"), vec!["echo", "abc def"]);
    }

    #[test]
    fn test_empty_input_parses_to_empty_command() {
        assert_eq!(parse_command("   "), ParsedCommand::default());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lower-cased command name.
    pub command: String,
    pub args: Vec<String>,
}

/// Splits `text` on whitespace. A double-quoted segment is one argument with
/// the quotes stripped; an unterminated quote keeps whatever followed it.
/// Returns `None` when there are no tokens at all.
pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        if c == '"' {
            if quoted {
                push_token(&mut tokens, &mut current);
            }
            quoted = !quoted;
        } else if c.is_whitespace() && !quoted {
            push_token(&mut tokens, &mut current);
        } else {
            current.push(c);
        }
    }
    push_token(&mut tokens, &mut current);

    let mut tokens = tokens.into_iter();
    let command = tokens.next()?.to_lowercase();
    Some(ParsedCommand {
        command,
        args: tokens.collect(),
    })
}

fn push_token(tokens: &mut Vec<String>, current: &mut String) {
    let token = current.trim();
    if !token.is_empty() {
        tokens.push(token.to_owned());
    }
    current.clear();
}

//! Chat command parsing.

/// Returns the keyword of a search command, or `None` if `input` is not one.
///
/// The keyword may be empty (`"/music"` on its own). Telegram-style bot
/// mentions (`/music@some_bot Yesterday`) are accepted for slash commands.
pub fn parse_search<'a>(prefixes: &[String], input: &'a str) -> Option<&'a str> {
    let trimmed = input.trim();
    prefixes.iter().find_map(|prefix| {
        let rest = trimmed.strip_prefix(prefix.as_str())?;
        let rest = if prefix.starts_with('/') {
            strip_bot_mention(rest)
        } else {
            rest
        };
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            Some(rest.trim())
        } else {
            None
        }
    })
}

/// A selection reply is a bare non-negative integer and nothing else.
pub fn parse_selection(input: &str) -> Option<usize> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

fn strip_bot_mention(rest: &str) -> &str {
    match rest.strip_prefix('@') {
        Some(mention) => mention
            .find(char::is_whitespace)
            .map_or("", |idx| &mention[idx..]),
        None => rest,
    }
}

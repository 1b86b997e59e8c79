/// UTF-8 safe string truncation by character count.
/// If the string exceeds `max_chars`, truncates and appends "...".
/// When `max_chars` is 3 or less, returns exactly `max_chars` characters
/// without ellipsis (no room for the "..." suffix).
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else if max_chars <= 3 {
        s.chars().take(max_chars).collect()
    } else {
        let end = s
            .char_indices()
            .nth(max_chars.saturating_sub(3))
            .map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Remove ANSI CSI escape sequences (`ESC [ ... final`) from CLI output.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Parameters and intermediates run until a final byte in @..~
                for next in chars.by_ref() {
                    if ('@'..='~').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Render a `0.0..=1.0` level as a fixed-width bar of block glyphs.
pub fn level_bar(value: f32, cells: usize) -> String {
    let filled = (value.clamp(0.0, 1.0) * cells as f32).round() as usize;
    let mut bar = String::with_capacity(cells * 3);
    for i in 0..cells {
        bar.push(if i < filled { '\u{25ae}' } else { '\u{25af}' });
    }
    bar
}

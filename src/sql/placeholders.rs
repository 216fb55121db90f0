//! Rewrites `$n` parameter references in caller-written SQL so a text-bound value is cast to
//! the type PostgreSQL inferred for that parameter.

/// Replace every `$n` with `($n::text::<type>)` when `types[n - 1]` is known. References inside
/// string literals, quoted identifiers, dollar-quoted bodies and comments are left alone.
pub fn cast_placeholders(sql: &str, types: &[Option<String>]) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + types.len() * 16);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                let escapes = i > 0 && matches!(chars[i - 1], 'e' | 'E') && !is_ident_char(chars.get(i.wrapping_sub(2)));
                i = copy_quoted(&chars, i, '\'', escapes, &mut out);
            }
            '"' => i = copy_quoted(&chars, i, '"', false, &mut out),
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..].iter().position(|&ch| ch == '\n').map_or(chars.len(), |p| i + p);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'*') => i = copy_block_comment(&chars, i, &mut out),
            '$' => {
                let digits_end = chars[i + 1..]
                    .iter()
                    .position(|ch| !ch.is_ascii_digit())
                    .map_or(chars.len(), |p| i + 1 + p);
                let after_ident = i > 0 && is_ident_char(Some(&chars[i - 1]));
                if digits_end > i + 1 && !after_ident {
                    let digits: String = chars[i + 1..digits_end].iter().collect();
                    let cast = digits
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|idx| types.get(idx))
                        .and_then(|t| t.as_deref());
                    match cast {
                        Some(ty) => out.push_str(&format!("(${}::text::{})", digits, ty)),
                        None => out.push_str(&format!("${}", digits)),
                    }
                    i = digits_end;
                } else if let Some(end) = dollar_quote_end(&chars, i).filter(|_| !after_ident) {
                    out.extend(&chars[i..end]);
                    i = end;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn is_ident_char(c: Option<&char>) -> bool {
    c.map(|c| c.is_alphanumeric() || *c == '_' || *c == '$').unwrap_or(false)
}

/// Copy a quoted run starting at `start` (the opening quote); doubled quotes stay inside.
fn copy_quoted(chars: &[char], start: usize, quote: char, backslash_escapes: bool, out: &mut String) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if backslash_escapes && chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            i += 1;
            break;
        }
        i += 1;
    }
    let end = i.min(chars.len());
    out.extend(&chars[start..end]);
    end
}

fn copy_block_comment(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < chars.len() {
        if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
            depth += 1;
            i += 2;
        } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
            depth -= 1;
            i += 2;
            if depth == 0 {
                break;
            }
        } else {
            i += 1;
        }
    }
    let end = i.min(chars.len());
    out.extend(&chars[start..end]);
    end
}

/// End (exclusive) of a `$tag$ ... $tag$` body opening at `start`, if one opens there.
fn dollar_quote_end(chars: &[char], start: usize) -> Option<usize> {
    let tag_len = chars[start + 1..].iter().position(|&c| c == '$')?;
    let tag = &chars[start + 1..start + 1 + tag_len];
    let valid = tag.first().map_or(true, |c| c.is_alphabetic() || *c == '_')
        && tag.iter().all(|c| c.is_alphanumeric() || *c == '_');
    if !valid {
        return None;
    }
    let delim: Vec<char> = chars[start..start + tag_len + 2].to_vec();
    let body_start = start + delim.len();
    let close = chars[body_start..]
        .windows(delim.len())
        .position(|w| w == delim.as_slice())
        .map_or(chars.len(), |p| body_start + p + delim.len());
    Some(close)
}

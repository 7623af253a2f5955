//! Shell-style wildcard matching for test selection
//!
//! Supported syntax:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the set or range
//! - `[!abc]` or `[^abc]` match one character NOT in the set
//! - `\x` matches `x` literally
//!
//! `/` has no special meaning; test names are plain file names.

/// Match `name` against `pattern`; the whole name must match.
///
/// ```ignore
/// assert!(wildmatch("t00*", "t0001-basic.sh"));
/// assert!(!wildmatch("t1*", "t0001-basic.sh"));
/// ```
pub fn wildmatch(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    // position after the last `*` and the name index it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;

    while ni < name.len() {
        if pi < pattern.len() {
            match pattern[pi] {
                '*' => {
                    while pi < pattern.len() && pattern[pi] == '*' {
                        pi += 1;
                    }
                    if pi == pattern.len() {
                        return true;
                    }
                    backtrack = Some((pi, ni));
                    continue;
                }
                '?' => {
                    pi += 1;
                    ni += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(&pattern, pi, name[ni]) {
                        if matched {
                            pi = next;
                            ni += 1;
                            continue;
                        }
                    } else if name[ni] == '[' {
                        // unterminated class is a literal '['
                        pi += 1;
                        ni += 1;
                        continue;
                    }
                }
                '\\' if pi + 1 < pattern.len() => {
                    if pattern[pi + 1] == name[ni] {
                        pi += 2;
                        ni += 1;
                        continue;
                    }
                }
                c => {
                    if c == name[ni] {
                        pi += 1;
                        ni += 1;
                        continue;
                    }
                }
            }
        }

        // mismatch: let the last `*` swallow one more character
        match backtrack {
            Some((star_pi, star_ni)) => {
                pi = star_pi;
                ni = star_ni + 1;
                backtrack = Some((star_pi, star_ni + 1));
            }
            None => return false,
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

/// Match one character against the class starting at `pattern[start] == '['`.
///
/// Returns whether it matched and the index just past the closing `]`, or
/// `None` when the class is never closed.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negated = matches!(pattern.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;

    loop {
        let mut lo = *pattern.get(i)?;
        if lo == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;

        if lo == '\\' {
            i += 1;
            lo = *pattern.get(i)?;
        }

        if pattern.get(i + 1) == Some(&'-') && pattern.get(i + 2).is_some_and(|&h| h != ']') {
            let mut hi_index = i + 2;
            if pattern[hi_index] == '\\' {
                hi_index += 1;
            }
            let hi = *pattern.get(hi_index)?;
            if lo <= c && c <= hi {
                matched = true;
            }
            i = hi_index + 1;
        } else {
            if lo == c {
                matched = true;
            }
            i += 1;
        }
    }
}

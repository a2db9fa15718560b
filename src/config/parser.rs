//! Line-oriented reader for the INI-like unit file grammar.
//!
//! Grammar (directly from the reference parser):
//! - blank or `#`-comment lines are ignored
//! - `[Section]` starts a new section; the name is case-folded for dispatch
//! - `Key = Value` assigns within the current section; leading/trailing
//!   whitespace around both key and value is trimmed
//! - an assignment before any `[Section]` header is a parse error

use crate::error::ParseError;

/// One parsed line: either a new section, or a key/value pair within the
/// current section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Section(String),
    Assign(String, String),
}

/// Parse `text` (the contents of `path`, used only for error messages) into
/// a sequence of `(section, key, value, line number)` tuples in file order.
pub fn parse(path: &str, text: &str) -> Result<Vec<(String, String, String, usize)>, ParseError> {
    let mut section: Option<String> = None;
    let mut out = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let lineno = idx + 1;
        match parse_line(raw_line) {
            None => {}
            Some(Entry::Section(name)) => section = Some(name),
            Some(Entry::Assign(key, value)) => match &section {
                Some(s) => out.push((s.clone(), key, value, lineno)),
                None => {
                    return Err(ParseError::new(
                        path,
                        lineno,
                        "assignment outside of any [Section]",
                    ))
                }
            },
        }
    }

    Ok(out)
}

fn parse_line(line: &str) -> Option<Entry> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(name) = rest.strip_suffix(']') {
            return Some(Entry::Section(name.trim().to_string()));
        }
    }
    if let Some(eq) = trimmed.find('=') {
        let key = trimmed[..eq].trim();
        let value = trimmed[eq + 1..].trim();
        if !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Some(Entry::Assign(key.to_string(), value.to_string()));
        }
    }
    None
}

/// `yes/true/1` vs `no/false/0`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// `infinity` -> `None`; otherwise a plain integer, or space-separated
/// `Nmin`/`Nsec` tokens summed into seconds.
pub fn parse_delay(value: &str) -> Option<Option<u64>> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("infinity") {
        return Some(None);
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(Some(secs));
    }
    let mut total = 0u64;
    let mut saw_token = false;
    for tok in trimmed.split_whitespace() {
        if let Some(digits) = tok.strip_suffix("min") {
            total += digits.parse::<u64>().ok()? * 60;
            saw_token = true;
        } else if let Some(digits) = tok.strip_suffix("sec") {
            total += digits.parse::<u64>().ok()?;
            saw_token = true;
        } else {
            return None;
        }
    }
    saw_token.then_some(Some(total))
}

/// Symbolic (`SIGTERM`) or bare integer signal number.
pub fn parse_signal(value: &str) -> Option<i32> {
    if let Ok(n) = value.parse::<i32>() {
        return Some(n);
    }
    let name = value.trim().to_ascii_uppercase();
    let name = name.strip_prefix("SIG").unwrap_or(&name);
    signal_number(name)
}

fn signal_number(name: &str) -> Option<i32> {
    use libc::*;
    Some(match name {
        "HUP" => SIGHUP,
        "INT" => SIGINT,
        "QUIT" => SIGQUIT,
        "ILL" => SIGILL,
        "TRAP" => SIGTRAP,
        "ABRT" => SIGABRT,
        "BUS" => SIGBUS,
        "FPE" => SIGFPE,
        "KILL" => SIGKILL,
        "USR1" => SIGUSR1,
        "SEGV" => SIGSEGV,
        "USR2" => SIGUSR2,
        "PIPE" => SIGPIPE,
        "ALRM" => SIGALRM,
        "TERM" => SIGTERM,
        "CHLD" => SIGCHLD,
        "CONT" => SIGCONT,
        "STOP" => SIGSTOP,
        "TSTP" => SIGTSTP,
        "TTIN" => SIGTTIN,
        "TTOU" => SIGTTOU,
        "URG" => SIGURG,
        "XCPU" => SIGXCPU,
        "XFSZ" => SIGXFSZ,
        "VTALRM" => SIGVTALRM,
        "PROF" => SIGPROF,
        "WINCH" => SIGWINCH,
        "IO" => SIGIO,
        "SYS" => SIGSYS,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_comment_lines_are_ignored() {
        let triples = parse("unit", "\n# comment\n   \n# another\n").unwrap();
        assert!(triples.is_empty());
    }

    #[test]
    fn assignment_outside_section_is_an_error() {
        let err = parse("unit", "Key = Value\n").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn section_dispatch_and_order() {
        let triples = parse(
            "unit",
            "[Service]\nExecStart = /bin/true\n[Unit]\nDescription = hi\n",
        )
        .unwrap();
        assert_eq!(
            triples,
            vec![
                ("Service".into(), "ExecStart".into(), "/bin/true".into(), 2),
                ("Unit".into(), "Description".into(), "hi".into(), 4),
            ]
        );
    }

    #[test]
    fn value_whitespace_is_trimmed_but_interior_preserved() {
        let triples = parse("unit", "[Service]\nExecStart =   /bin/echo  a  b  \n").unwrap();
        assert_eq!(triples[0].2, "/bin/echo  a  b");
    }

    #[test]
    fn delay_parses_infinity_plain_and_compound() {
        assert_eq!(parse_delay("infinity"), Some(None));
        assert_eq!(parse_delay("30"), Some(Some(30)));
        assert_eq!(parse_delay("1min 30sec"), Some(Some(90)));
        assert_eq!(parse_delay("bogus"), None);
    }

    #[test]
    fn signal_parses_symbolic_and_numeric() {
        assert_eq!(parse_signal("SIGTERM"), Some(libc::SIGTERM));
        assert_eq!(parse_signal("TERM"), Some(libc::SIGTERM));
        assert_eq!(parse_signal("9"), Some(9));
        assert_eq!(parse_signal("NOTASIGNAL"), None);
    }
}

//! Command-line splitting for the REPL.

/// Split an input line into command arguments.
///
/// Whitespace separates arguments; single or double quotes group them.
/// Inside double quotes, `\"`, `\\`, `\n` and `\t` are recognized.
/// Returns `None` for unbalanced quotes.
pub fn split_args(line: &str) -> Option<Vec<Vec<u8>>> {
    let mut args: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut in_arg = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ' ' | '\t' if in_arg => {
                args.push(std::mem::take(&mut current));
                in_arg = false;
            }
            ' ' | '\t' => {}
            '\'' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => {
                            let mut buf = [0u8; 4];
                            current.extend_from_slice(inner.encode_utf8(&mut buf).as_bytes());
                        }
                        None => return None,
                    }
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => current.push(b'\n'),
                            Some('t') => current.push(b'\t'),
                            Some('"') => current.push(b'"'),
                            Some('\\') => current.push(b'\\'),
                            Some(other) => {
                                current.push(b'\\');
                                let mut buf = [0u8; 4];
                                current.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
                            }
                            None => return None,
                        },
                        Some(inner) => {
                            let mut buf = [0u8; 4];
                            current.extend_from_slice(inner.encode_utf8(&mut buf).as_bytes());
                        }
                        None => return None,
                    }
                }
            }
            other => {
                in_arg = true;
                let mut buf = [0u8; 4];
                current.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    Some(args)
}

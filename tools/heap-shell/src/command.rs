use kernel_alloc::PhysAddr;

/// One line of shell input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Alloc(usize),
    Free(PhysAddr),
    Pages(usize),
    FreePage(PhysAddr),
    Defrag,
    Walk,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  alloc <bytes>       allocate a zeroed block
  free <addr>         free a block by payload address
  pages <count>       allocate contiguous pages
  freepage <addr>     free a single page
  defrag              coalesce adjacent free blocks
  walk                list all heap blocks
  status              print the memory report
  help                show this text
  quit                leave the shell";

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_number(s: &str) -> Option<usize> {
    let s = s.trim().replace('_', "");
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

impl Command {
    /// Parse a command line. Blank lines and `#` comments yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.split('#').next().unwrap_or_default().trim();
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(format!("unexpected argument '{extra}'"));
        }

        let number = |what: &str| -> Result<usize, String> {
            let raw = arg.ok_or_else(|| format!("{verb}: missing {what}"))?;
            parse_number(raw).ok_or_else(|| format!("{verb}: invalid {what} '{raw}'"))
        };

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "alloc" | "a" => Self::Alloc(number("size")?),
            "free" | "f" => Self::Free(PhysAddr::new(number("address")?)),
            "pages" | "p" => Self::Pages(number("count")?),
            "freepage" | "fp" => Self::FreePage(PhysAddr::new(number("address")?)),
            "defrag" => Self::Defrag,
            "walk" => Self::Walk,
            "status" | "mem" => Self::Status,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x10_0000"), Some(0x10_0000));
        assert_eq!(parse_number("0XfF"), Some(255));
        assert_eq!(parse_number("zz"), None);
    }

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(Command::parse("alloc 100"), Ok(Some(Command::Alloc(100))));
        assert_eq!(
            Command::parse("  FREE 0x100010  "),
            Ok(Some(Command::Free(PhysAddr::new(0x10_0010))))
        );
        assert_eq!(Command::parse("pages 3"), Ok(Some(Command::Pages(3))));
        assert_eq!(
            Command::parse("fp 0xfe0000"),
            Ok(Some(Command::FreePage(PhysAddr::new(0xFE_0000))))
        );
        assert_eq!(Command::parse("status # report"), Ok(Some(Command::Status)));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(Command::parse(""), Ok(None));
        assert_eq!(Command::parse("   # just a note"), Ok(None));
    }

    #[test]
    fn reports_malformed_input() {
        assert_eq!(Command::parse("alloc"), Err("alloc: missing size".to_string()));
        assert_eq!(
            Command::parse("alloc lots"),
            Err("alloc: invalid size 'lots'".to_string())
        );
        assert!(Command::parse("defrag now please").is_err());
        assert!(Command::parse("format c:").is_err());
    }
}

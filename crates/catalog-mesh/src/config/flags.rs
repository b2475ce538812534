//! Command-line flag lookup against a captured argv, grounded on
//! `original_source/bind.go`'s `flag()` helper.

/// Looks up `--name=value`, `--name value`, or `-x value` (single-char
/// names use a single dash) in `argv`.
pub fn lookup(argv: &[String], name: &str) -> Option<String> {
    let prefix = if name.chars().count() == 1 { "-" } else { "--" };
    let flag = format!("{prefix}{name}");

    for (i, arg) in argv.iter().enumerate() {
        if let Some(eq) = arg.find('=') {
            if arg.starts_with(&flag) && &arg[..eq] == flag {
                return Some(arg[eq + 1..].to_string());
            }
        }
        if arg == &flag {
            return argv.get(i + 1).cloned();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_equals_form() {
        let argv = vec!["--port=9090".to_string()];
        assert_eq!(lookup(&argv, "port"), Some("9090".to_string()));
    }

    #[test]
    fn finds_space_separated_form() {
        let argv = vec!["--port".to_string(), "9090".to_string()];
        assert_eq!(lookup(&argv, "port"), Some("9090".to_string()));
    }

    #[test]
    fn single_char_uses_single_dash() {
        let argv = vec!["-x".to_string(), "on".to_string()];
        assert_eq!(lookup(&argv, "x"), Some("on".to_string()));
    }

    #[test]
    fn missing_flag_returns_none() {
        let argv = vec!["--other=1".to_string()];
        assert_eq!(lookup(&argv, "port"), None);
    }
}

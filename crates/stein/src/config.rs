/// Session configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum nesting of function applications before evaluation fails with
    /// [`Error::StackExhausted`](crate::error::Error::StackExhausted).
    pub max_depth: usize,
}

impl Config {
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    /// Defaults, overridden by `STEIN_MAX_DEPTH` when it is set.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(depth) = read_uint_from_env("STEIN_MAX_DEPTH") {
            config.max_depth = depth;
        }
        config
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

pub fn read_uint_from_env(var: &str) -> Option<usize> {
    parse_uint(&std::env::var(var).ok()?)
}

/// Parses `512`, `2k` or `1m`.
pub fn parse_uint(text: &str) -> Option<usize> {
    let text = text.trim();
    let (digits, factor) = match text.as_bytes().last()? {
        b'k' | b'K' => (&text[..text.len() - 1], 1024),
        b'm' | b'M' => (&text[..text.len() - 1], 1024 * 1024),
        _ => (text, 1),
    };
    digits.parse::<usize>().ok()?.checked_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uint() {
        assert_eq!(parse_uint("512"), Some(512));
        assert_eq!(parse_uint(" 2k "), Some(2048));
        assert_eq!(parse_uint("1M"), Some(1024 * 1024));
        assert_eq!(parse_uint(""), None);
        assert_eq!(parse_uint("k"), None);
        assert_eq!(parse_uint("deep"), None);
    }
}

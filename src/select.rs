//! Choosing which services of a bundle to load.
//!
//! Bundles routinely carry services nobody wants to read (camera managers
//! can dwarf everything else), so selection happens before any member is
//! decompressed.

/// Include/exclude patterns over service names.
///
/// Patterns support `*` and `?`. With no include patterns every service is
/// loaded; exclusions always win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSelector {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ServiceSelector {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn accepts(&self, service_name: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|p| glob_match(p, service_name));
        included && !self.exclude.iter().any(|p| glob_match(p, service_name))
    }
}

/// Glob matching with `*` (any run of characters) and `?` (one character).
///
/// On a mismatch only the most recent `*` is retried, one text character
/// further on, so the cost stays at most pattern length times text length.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Pattern index of the last `*` and the text index it currently extends to
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_wildcards() {
        assert!(glob_match("*", "kraken"));
        assert!(glob_match("mavlink-*", "mavlink-camera-manager"));
        assert!(glob_match("*camera*", "mavlink-camera-manager"));
        assert!(glob_match("pin?", "ping"));
        assert!(!glob_match("pin?", "pingo"));
        assert!(!glob_match("kraken", "Kraken"));
        assert!(glob_match("", ""));
        assert!(glob_match("**", ""));
        assert!(!glob_match("", "kraken"));
        assert!(glob_match("*-manager", "ardupilot-manager-manager"));
        assert!(!glob_match("*-manager", "ardupilot-manager-x"));
        assert!(glob_match("a*b?d", "axxbxbcd"));
    }

    #[test]
    fn glob_many_stars_stays_fast() {
        let text = "a".repeat(200);
        let pattern = format!("{}b", "*a".repeat(30));
        assert!(!glob_match(&pattern, &text));
        assert!(glob_match(&"*a".repeat(30), &text));
    }

    #[test]
    fn everything_by_default() {
        assert!(ServiceSelector::default().accepts("anything"));
    }

    #[test]
    fn include_then_exclude() {
        let selector = ServiceSelector::default()
            .include("ardupilot-*")
            .include("kraken")
            .exclude("*-manager");
        assert!(selector.accepts("kraken"));
        assert!(selector.accepts("ardupilot-logs"));
        assert!(!selector.accepts("ardupilot-manager"));
        assert!(!selector.accepts("beacon"));
    }
}

/// Comma-separated selection list with `*` wildcards, e.g. `sda,sdb,nvme*`.
///
/// An empty list or the keyword `all` selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    patterns: Vec<String>,
}

impl Filter {
    pub fn parse(list: &str) -> Self {
        let patterns: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if patterns.iter().any(|p| p.eq_ignore_ascii_case("all") || p == "*") {
            return Self::default();
        }
        Self { patterns }
    }

    pub fn matches_all(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matches_all() || self.patterns.iter().any(|p| wildcard_match(p, name))
    }
}

fn wildcard_match(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    // split always yields at least one element
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_all_select_everything() {
        assert!(Filter::parse("").matches("eth0"));
        assert!(Filter::parse(" , ").matches("eth0"));
        assert!(Filter::parse("all").matches("/mnt/data"));
        assert!(Filter::parse("eth0,*").matches_all());
    }

    #[test]
    fn exact_names() {
        let filter = Filter::parse("/, /mnt/disk");
        assert!(filter.matches("/"));
        assert!(filter.matches("/mnt/disk"));
        assert!(!filter.matches("/mnt"));
        assert!(!filter.matches("/mnt/disk2"));
    }

    #[test]
    fn wildcards() {
        let filter = Filter::parse("sd*,*eth,nv*n1");
        assert!(filter.matches("sda"));
        assert!(filter.matches("sd"));
        assert!(filter.matches("veth"));
        assert!(filter.matches("nvme0n1"));
        assert!(!filter.matches("nvme0n1p1"));
        assert!(!filter.matches("hda"));
        assert!(!filter.matches("eth0"));
    }

    #[test]
    fn overlapping_prefix_and_suffix() {
        assert!(!wildcard_match("ab*ba", "aba"));
        assert!(wildcard_match("ab*ba", "abba"));
        assert!(wildcard_match("a*b*c", "axxbyyc"));
    }
}

//! Count formatting for log lines and reports.

/// `"s"` unless `n == 1`.
#[inline]
pub fn plural_s(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// `3 routes`, `1 asset`, `0 failures`.
#[inline]
pub fn plural_count(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", plural_s(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural_count() {
        assert_eq!(plural_count(0, "route"), "0 routes");
        assert_eq!(plural_count(1, "route"), "1 route");
        assert_eq!(plural_count(3, "asset"), "3 assets");
    }
}

//! MQTT-style topic patterns: `+` matches one level, `#` matches the rest.

use crate::error::TransportError;

/// Checks that `pattern` is a well-formed subscription pattern.
pub fn validate_pattern(pattern: &str) -> Result<(), TransportError> {
    let invalid = |reason: &str| TransportError::InvalidTopic {
        topic: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.is_empty() {
        return Err(invalid("empty pattern"));
    }

    let levels: Vec<&str> = pattern.split('/').collect();
    let last = levels.len() - 1;
    for (i, level) in levels.iter().enumerate() {
        match *level {
            "#" if i != last => return Err(invalid("'#' must be the last level")),
            "#" | "+" => {}
            l if l.contains('#') || l.contains('+') => {
                return Err(invalid("wildcard must occupy a whole level"));
            }
            _ => {}
        }
    }
    Ok(())
}

/// True if the concrete `topic` is matched by `pattern`.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }

    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(p), Some(t)) if p == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_wellformed_patterns() {
        for p in ["a/b", "edgex/events/#", "a/+/c", "#", "+", "a/+/#"] {
            assert!(validate_pattern(p).is_ok(), "{p} should be valid");
        }
    }

    #[test]
    fn test_validate_rejects_malformed_patterns() {
        for p in ["", "a/#/c", "a/b#", "a/+b/c", "#/a"] {
            let err = validate_pattern(p).unwrap_err();
            assert_eq!(err.as_label(), "transport_invalid_topic", "{p}");
        }
    }

    #[test]
    fn test_multi_level_wildcard() {
        assert!(topic_matches("edgex/events/#", "edgex/events/device/sensor01"));
        assert!(topic_matches("edgex/events/#", "edgex/events"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(!topic_matches("edgex/events/#", "edgex/commands/x"));
    }

    #[test]
    fn test_single_level_wildcard() {
        assert!(topic_matches("a/+/c", "a/b/c"));
        assert!(!topic_matches("a/+/c", "a/b/x/c"));
        assert!(!topic_matches("a/+", "a"));
    }

    #[test]
    fn test_exact_match() {
        assert!(topic_matches("a/b", "a/b"));
        assert!(!topic_matches("a/b", "a/b/c"));
        assert!(!topic_matches("a/b/c", "a/b"));
    }
}

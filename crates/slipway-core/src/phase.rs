//! Boot phase names and phase-list arithmetic.

pub const LOAD: &str = "load";
pub const COMPILE: &str = "compile";
pub const STARTING: &str = "starting";
pub const START: &str = "start";
pub const STARTED: &str = "started";

/// The fixed built-in phase sequence.
pub fn default_phases() -> Vec<String> {
    [LOAD, COMPILE, STARTING, START, STARTED]
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}

/// Extend `base` with `extra`, deduplicating while preserving the relative
/// order of every previously-declared phase.
pub fn extend_phases(base: &[String], extra: &[String]) -> Vec<String> {
    let mut result: Vec<String> = base.to_vec();
    for phase in extra {
        if !result.iter().any(|p| p == phase) {
            result.push(phase.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sequence_is_fixed() {
        assert_eq!(
            default_phases(),
            vec!["load", "compile", "starting", "start", "started"]
        );
    }

    #[test]
    fn extend_preserves_existing_order() {
        let base = default_phases();
        let extended = extend_phases(&base, &["report".into(), "start".into()]);
        assert_eq!(
            extended,
            vec!["load", "compile", "starting", "start", "started", "report"]
        );
    }

    #[test]
    fn extend_deduplicates() {
        let base = vec!["load".to_string(), "compile".to_string()];
        let extended = extend_phases(&base, &["compile".into(), "load".into()]);
        assert_eq!(extended, vec!["load", "compile"]);
    }
}

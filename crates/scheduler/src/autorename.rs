//! The deterministic autorename phase function, spec.md §4.7 step 4:
//! "Autorename generates names through a deterministic phase function
//! `(phase, original) -> candidate`; each candidate is first checked
//! against the cached listing to avoid a wasted `MKD`. The phase advances
//! until exhausted; exhaustion yields `UploadCrDirAutoRenFailed`."
//!
//! Grounded in `original_source/src/plugins/ftp/operatsa.cpp`'s
//! `FTPGenerateNewName`/`UploadAutorenamePhase` sequence: phase 0 is the
//! original name unmodified, phase 1 appends a bounded `(n)` counter
//! (matching the numbered-suffix convention [`diskpool::pool`]'s own
//! local autorename already uses for files), and phase 2 falls back to a
//! short random-looking suffix derived from the candidate count before
//! giving up.

/// The bound on phase 1's `(n)` counter before falling through to phase 2,
/// matching [`diskpool`]'s own `first_free_autorenamed` bound.
const NUMBERED_SUFFIX_LIMIT: u32 = 9999;

/// The bound on phase 2's fallback-suffix attempts before autorename is
/// considered exhausted.
const FALLBACK_SUFFIX_LIMIT: u32 = 36 * 36;

/// One attempt in an autorename sequence: an ordinal the caller threads
/// back into [`next_candidate`] to advance, and the candidate name to try
/// next.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RenameAttempt {
    /// The ordinal of this attempt within the whole sequence (0-based),
    /// threaded back into the next [`next_candidate`] call.
    pub ordinal: u32,
    /// The directory name to try creating.
    pub candidate: String,
}

/// Produces the next autorename candidate after `ordinal` attempts have
/// already been tried and rejected (via a collision found in the cached
/// listing, or a `5xx` on `MKD`). `ordinal = 0` requests the very first
/// candidate.
///
/// Returns `None` once the sequence is exhausted, which the caller turns
/// into `UploadCrDirAutoRenFailed`. The sequence never repeats a name and
/// always terminates, satisfying spec.md §8's "autorename exhaustion must
/// yield `UploadCrDirAutoRenFailed` (never loop)".
#[must_use]
pub fn next_candidate(original: &str, ordinal: u32) -> Option<RenameAttempt> {
    if ordinal >= NUMBERED_SUFFIX_LIMIT + FALLBACK_SUFFIX_LIMIT {
        return None;
    }

    let candidate = if ordinal < NUMBERED_SUFFIX_LIMIT {
        format!("{original}({})", ordinal + 1)
    } else {
        let index = ordinal - NUMBERED_SUFFIX_LIMIT;
        format!("{original}_{}", base36(index))
    };

    Some(RenameAttempt { ordinal, candidate })
}

/// Renders `value` as a two-character base-36 suffix (`00`..`zz`), giving
/// phase 2's fallback names a compact, visually distinct shape from phase
/// 1's `(n)` sequence.
fn base36(value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let high = DIGITS[(value / 36) as usize % 36] as char;
    let low = DIGITS[(value % 36) as usize] as char;
    format!("{high}{low}")
}

/// Checks a candidate name against a cached listing's entries, returning
/// `true` if it is free to use (spec.md §4.7 step 4: "each candidate is
/// first checked against the cached listing to avoid a wasted `MKD`").
#[must_use]
pub fn is_free(candidate: &str, listed_names: &[String]) -> bool {
    !listed_names.iter().any(|name| name == candidate)
}

/// Runs the full autorename sequence against a cached listing in memory,
/// without issuing any `MKD` calls, returning the first free candidate.
/// A real worker still issues `MKD` against the winning candidate and
/// treats a surprise `5xx` (a race with another client) by calling this
/// again from the next ordinal.
#[must_use]
pub fn first_free_candidate(original: &str, listed_names: &[String]) -> Option<RenameAttempt> {
    let mut ordinal = 0;
    while let Some(attempt) = next_candidate(original, ordinal) {
        if is_free(&attempt.candidate, listed_names) {
            return Some(attempt);
        }
        ordinal += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_one_appends_a_numbered_suffix() {
        let attempt = next_candidate("docs", 0).unwrap();
        assert_eq!(attempt.candidate, "docs(1)");
        let attempt = next_candidate("docs", 1).unwrap();
        assert_eq!(attempt.candidate, "docs(2)");
    }

    #[test]
    fn phase_two_falls_back_to_a_short_suffix_after_the_numbered_bound() {
        let attempt = next_candidate("docs", NUMBERED_SUFFIX_LIMIT).unwrap();
        assert_eq!(attempt.candidate, "docs_00");
    }

    #[test]
    fn sequence_is_exhausted_eventually() {
        let total = NUMBERED_SUFFIX_LIMIT + FALLBACK_SUFFIX_LIMIT;
        assert!(next_candidate("docs", total - 1).is_some());
        assert!(next_candidate("docs", total).is_none());
    }

    #[test]
    fn first_free_candidate_skips_collisions() {
        let listed = vec!["docs(1)".to_string(), "docs(2)".to_string()];
        let attempt = first_free_candidate("docs", &listed).unwrap();
        assert_eq!(attempt.candidate, "docs(3)");
    }

    #[test]
    fn first_free_candidate_never_loops_when_everything_collides() {
        let listed: Vec<String> = (0..NUMBERED_SUFFIX_LIMIT + FALLBACK_SUFFIX_LIMIT)
            .map(|ordinal| next_candidate("docs", ordinal).unwrap().candidate)
            .collect();
        assert!(first_free_candidate("docs", &listed).is_none());
    }
}

use crate::config::ModerationConfig;
use crate::models::Decision;
use std::collections::HashSet;

/// Banned-word content classifier.
///
/// Scores text by the fraction of its words that are banned, then maps the
/// score onto a decision through two configurable thresholds.
pub struct Classifier {
    bad_words: HashSet<String>,
    suspect_threshold: f64,
    rejected_threshold: f64,
}

/// Outcome of classifying a piece of content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub score: f64,
}

impl Classifier {
    pub fn new(config: &ModerationConfig) -> Self {
        Self {
            bad_words: config.bad_words.iter().map(|w| w.to_lowercase()).collect(),
            suspect_threshold: config.suspect_threshold,
            rejected_threshold: config.rejected_threshold,
        }
    }

    /// Classify a piece of text.
    ///
    /// The score is banned-word hits over total word count; empty text scores
    /// zero. Thresholds are inclusive, and rejection wins over suspicion.
    pub fn classify(&self, text: &str) -> Verdict {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        let hits = words.iter().filter(|w| self.bad_words.contains(*w)).count();
        let score = hits as f64 / words.len().max(1) as f64;

        let decision = if score >= self.rejected_threshold {
            Decision::Rejected
        } else if score >= self.suspect_threshold {
            Decision::Suspect
        } else {
            Decision::Accepted
        };

        Verdict { decision, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(bad_words: &[&str], suspect: f64, rejected: f64) -> Classifier {
        Classifier::new(&ModerationConfig {
            bad_words: bad_words.iter().map(|w| w.to_string()).collect(),
            suspect_threshold: suspect,
            rejected_threshold: rejected,
            flag_limit: 3,
            content_limit: 500,
        })
    }

    #[test]
    fn clean_text_is_accepted() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        let verdict = c.classify("uma postagem perfeitamente normal");
        assert_eq!(verdict.decision, Decision::Accepted);
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn half_banned_text_is_suspect() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        // 2 hits out of 4 words, exactly at the suspect threshold.
        let verdict = c.classify("post ruim muito ruim");
        assert_eq!(verdict.decision, Decision::Suspect);
        assert!((verdict.score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn fully_banned_text_is_rejected() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        let verdict = c.classify("ruim ruim ruim");
        assert_eq!(verdict.decision, Decision::Rejected);
        assert!((verdict.score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejected_threshold_is_inclusive() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        // 4 hits out of 5 words sits exactly on the rejection threshold.
        let verdict = c.classify("ruim ruim ruim ruim ok");
        assert_eq!(verdict.decision, Decision::Rejected);
    }

    #[test]
    fn matching_ignores_case_and_punctuation() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        let verdict = c.classify("RUIM, Ruim!");
        assert_eq!(verdict.decision, Decision::Rejected);
    }

    #[test]
    fn empty_text_scores_zero() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        let verdict = c.classify("");
        assert_eq!(verdict.decision, Decision::Accepted);
        assert_eq!(verdict.score, 0.0);
    }

    #[test]
    fn low_thresholds_catch_a_single_hit() {
        let c = classifier(&["ruim"], 0.1, 0.2);
        // 1 hit in 8 words: 0.125 sits between the two thresholds.
        let verdict = c.classify("um texto com uma palavra ruim entre oito");
        assert_eq!(verdict.decision, Decision::Suspect);
        // 1 hit in 4 words clears the rejection threshold.
        let verdict = c.classify("texto ruim bem curto");
        assert_eq!(verdict.decision, Decision::Rejected);
    }

    #[test]
    fn substrings_of_banned_words_do_not_match() {
        let c = classifier(&["ruim"], 0.5, 0.8);
        let verdict = c.classify("ruimada arruinado");
        assert_eq!(verdict.decision, Decision::Accepted);
    }
}

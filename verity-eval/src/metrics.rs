//! Classification metrics shared by the evaluators.

use serde::{Deserialize, Serialize};

/// Metrics for binary classification evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl BinaryMetrics {
    /// Count outcomes treating `positive` as the positive class.
    pub fn from_pairs<T: PartialEq>(
        pairs: impl IntoIterator<Item = (T, T)>,
        positive: &T,
    ) -> Self {
        let mut m = Self::default();
        for (gold, predicted) in pairs {
            match (gold == *positive, predicted == *positive) {
                (true, true) => m.true_positives += 1,
                (false, false) => m.true_negatives += 1,
                (false, true) => m.false_positives += 1,
                (true, false) => m.false_negatives += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    pub fn precision(&self) -> f64 {
        let denom = self.true_positives + self.false_positives;
        if denom == 0 {
            0.0
        } else {
            self.true_positives as f64 / denom as f64
        }
    }

    pub fn recall(&self) -> f64 {
        let denom = self.true_positives + self.false_negatives;
        if denom == 0 {
            0.0
        } else {
            self.true_positives as f64 / denom as f64
        }
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.true_positives + self.true_negatives) as f64 / total as f64
        }
    }

    /// The same counts seen from the other class.
    pub fn flipped(&self) -> Self {
        Self {
            true_positives: self.true_negatives,
            true_negatives: self.true_positives,
            false_positives: self.false_negatives,
            false_negatives: self.false_positives,
        }
    }

    pub fn class_scores(&self) -> ClassScores {
        ClassScores {
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
        }
    }
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Counts of gold label (rows) against predicted label (columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub gold_labels: Vec<String>,
    pub predicted_labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(gold_labels: &[&str], predicted_labels: &[&str]) -> Self {
        Self {
            gold_labels: gold_labels.iter().map(|s| s.to_string()).collect(),
            predicted_labels: predicted_labels.iter().map(|s| s.to_string()).collect(),
            counts: vec![vec![0; predicted_labels.len()]; gold_labels.len()],
        }
    }

    /// Count one observation; labels outside the matrix are ignored.
    pub fn record(&mut self, gold: &str, predicted: &str) {
        let row = self.gold_labels.iter().position(|l| l == gold);
        let col = self.predicted_labels.iter().position(|l| l == predicted);
        if let (Some(r), Some(c)) = (row, col) {
            self.counts[r][c] += 1;
        }
    }

    pub fn get(&self, gold: &str, predicted: &str) -> usize {
        let row = self.gold_labels.iter().position(|l| l == gold);
        let col = self.predicted_labels.iter().position(|l| l == predicted);
        match (row, col) {
            (Some(r), Some(c)) => self.counts[r][c],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Render as a Markdown table.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("| gold \\ predicted |");
        for label in &self.predicted_labels {
            out.push_str(&format!(" {} |", label));
        }
        out.push('\n');
        out.push_str("|---|");
        out.push_str(&"---:|".repeat(self.predicted_labels.len()));
        out.push('\n');
        for (label, row) in self.gold_labels.iter().zip(&self.counts) {
            out.push_str(&format!("| {} |", label));
            for count in row {
                out.push_str(&format!(" {} |", count));
            }
            out.push('\n');
        }
        out
    }
}

/// `part / whole`, or 0 when `whole` is 0.
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binary_metrics_precision() {
        let m = BinaryMetrics {
            true_positives: 8,
            true_negatives: 5,
            false_positives: 2,
            false_negatives: 1,
        };
        // precision = 8 / (8 + 2) = 0.8
        assert!((m.precision() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_binary_metrics_f1() {
        let m = BinaryMetrics {
            true_positives: 8,
            true_negatives: 5,
            false_positives: 2,
            false_negatives: 2,
        };
        assert!((m.f1() - 0.8).abs() < 1e-12);
        assert!((m.accuracy() - 13.0 / 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_binary_metrics_zero_division() {
        let m = BinaryMetrics::default();
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.f1(), 0.0);
        assert_eq!(m.accuracy(), 0.0);
    }

    #[test]
    fn test_from_pairs_and_flip() {
        let pairs = vec![(true, true), (true, false), (false, false), (false, true), (true, true)];
        let m = BinaryMetrics::from_pairs(pairs, &true);
        assert_eq!(
            m,
            BinaryMetrics {
                true_positives: 2,
                true_negatives: 1,
                false_positives: 1,
                false_negatives: 1,
            }
        );
        let f = m.flipped();
        assert_eq!(f.true_positives, 1);
        assert_eq!(f.false_positives, 1);
        assert_eq!(f.accuracy(), m.accuracy());
    }

    #[test]
    fn test_confusion_matrix_markdown() {
        let mut cm = ConfusionMatrix::new(&["yes", "no"], &["yes", "no", "unknown"]);
        cm.record("yes", "yes");
        cm.record("no", "unknown");
        cm.record("no", "no");
        cm.record("maybe", "yes");
        assert_eq!(cm.total(), 3);
        assert_eq!(cm.get("no", "unknown"), 1);
        assert_eq!(
            cm.to_markdown(),
            "| gold \\ predicted | yes | no | unknown |\n|---|---:|---:|---:|\n| yes | 1 | 0 | 0 |\n| no | 0 | 1 | 1 |\n"
        );
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(1, 4), 0.25);
        assert_eq!(ratio(3, 0), 0.0);
    }
}

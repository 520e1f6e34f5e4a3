use crate::models::SelectedLine;
use serde::{Deserialize, Serialize};

/// Scalars derived from one selected line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMetrics {
    pub line_number: i64,
    pub length: usize,
    pub word_count: usize,
    /// `length / word_count`, 0 for lines without words
    pub chars_per_word: f64,
}

/// Least-squares line `word_count = slope * length + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Everything the plots and the metrics API need about a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionMetrics {
    pub lines: Vec<LineMetrics>,
    pub mean_length: f64,
    pub mean_word_count: f64,
    pub gaps: Vec<i64>,
    pub mean_gap: Option<f64>,
    pub trend: Option<LinearFit>,
}

pub fn char_length(content: &str) -> usize {
    content.chars().count()
}

pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

impl LineMetrics {
    pub fn new(line_number: i64, content: &str) -> Self {
        let length = char_length(content);
        let word_count = word_count(content);
        let chars_per_word = if word_count > 0 {
            length as f64 / word_count as f64
        } else {
            0.0
        };

        Self {
            line_number,
            length,
            word_count,
            chars_per_word,
        }
    }
}

impl SelectionMetrics {
    /// Derive metrics from `(line_number, content)` pairs in ascending line order.
    pub fn derive<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        let lines: Vec<LineMetrics> = pairs
            .into_iter()
            .map(|(line_number, content)| LineMetrics::new(line_number, content))
            .collect();

        let lengths: Vec<f64> = lines.iter().map(|l| l.length as f64).collect();
        let word_counts: Vec<f64> = lines.iter().map(|l| l.word_count as f64).collect();

        let gaps: Vec<i64> = lines
            .windows(2)
            .map(|pair| pair[1].line_number - pair[0].line_number)
            .collect();
        let gap_values: Vec<f64> = gaps.iter().map(|&g| g as f64).collect();

        Self {
            mean_length: mean(&lengths).unwrap_or(0.0),
            mean_word_count: mean(&word_counts).unwrap_or(0.0),
            mean_gap: mean(&gap_values),
            trend: linear_fit(&lengths, &word_counts),
            gaps,
            lines,
        }
    }

    pub fn from_selection(selected: &[SelectedLine]) -> Self {
        Self::derive(selected.iter().map(|s| (s.line_number, s.content.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_numbers(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.line_number as f64).collect()
    }

    pub fn lengths(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.length as f64).collect()
    }

    pub fn word_counts(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.word_count as f64).collect()
    }

    pub fn chars_per_word(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.chars_per_word).collect()
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Ordinary least squares over paired samples. Needs at least two points
/// and some spread in `xs`.
///
/// When every `x` is equal this returns `None` and the plots draw no trend
/// line. numpy's `polyfit` would still return a least-squares solution there,
/// so the two differ for uniform line lengths.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }

    let mean_x = mean(xs)?;
    let mean_y = mean(ys)?;

    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_scalars() {
        let empty = LineMetrics::new(1, "");
        assert_eq!(empty.word_count, 0);
        assert_eq!(empty.chars_per_word, 0.0);

        let spaced = LineMetrics::new(2, "a b  c");
        assert_eq!(spaced.length, 6);
        assert_eq!(spaced.word_count, 3);
        assert!((spaced.chars_per_word - 2.0).abs() < 1e-9);

        assert_eq!(LineMetrics::new(3, "   \t ").word_count, 0);
        assert_eq!(LineMetrics::new(4, "21.5°C ok").length, 9);
    }

    #[test]
    fn test_gaps() {
        let metrics = SelectionMetrics::derive(vec![(2, "a"), (5, "b"), (6, "c"), (10, "d")]);

        assert_eq!(metrics.gaps, vec![3, 1, 4]);
        let mean_gap = metrics.mean_gap.unwrap();
        assert!((mean_gap - 8.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_line_has_no_gaps_or_trend() {
        let metrics = SelectionMetrics::derive(vec![(7, "only line")]);

        assert!(metrics.gaps.is_empty());
        assert_eq!(metrics.mean_gap, None);
        assert_eq!(metrics.trend, None);
        assert_eq!(metrics.mean_length, 9.0);
        assert_eq!(metrics.mean_word_count, 2.0);
    }

    #[test]
    fn test_empty_selection() {
        let metrics = SelectionMetrics::derive(Vec::<(i64, &str)>::new());

        assert!(metrics.is_empty());
        assert_eq!(metrics.mean_length, 0.0);
        assert_eq!(metrics.mean_gap, None);
    }

    #[test]
    fn test_trend_fit() {
        // word_count = 0.5 * length - 1 exactly
        let metrics = SelectionMetrics::derive(vec![(1, "ab cd"), (2, "a b c d"), (3, "aaaaaa b")]);
        let lengths = metrics.lengths();
        assert_eq!(lengths, vec![5.0, 7.0, 8.0]);

        let fit = linear_fit(&[2.0, 4.0, 6.0], &[0.0, 1.0, 2.0]).unwrap();
        assert!((fit.slope - 0.5).abs() < 1e-9);
        assert!((fit.intercept + 1.0).abs() < 1e-9);
        assert!((fit.at(10.0) - 4.0).abs() < 1e-9);

        assert!(metrics.trend.is_some());
    }

    #[test]
    fn test_trend_absent_without_spread() {
        assert_eq!(linear_fit(&[3.0, 3.0], &[1.0, 2.0]), None);
        assert_eq!(linear_fit(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_from_selection() {
        let selected = vec![SelectedLine {
            id: 1,
            file_id: 1,
            line_number: 4,
            content: "hello world".to_string(),
            selected_at: 0,
        }];

        let metrics = SelectionMetrics::from_selection(&selected);
        assert_eq!(metrics.lines[0].line_number, 4);
        assert_eq!(metrics.lines[0].word_count, 2);
    }
}

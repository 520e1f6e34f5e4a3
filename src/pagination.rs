use std::ops::Range;

/// Splits `total` items into non-overlapping windows of `page_size`.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: usize,
    page_size: usize,
}

/// One window of the paginated sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number after clamping
    pub number: usize,
    pub page_count: usize,
    /// Number of items before this page; add local index + 1 for the line number
    pub start_offset: usize,
    /// Indices into the full sequence covered by this page
    pub range: Range<usize>,
}

impl Paginator {
    pub fn new(total: usize, page_size: usize) -> Self {
        Self {
            total,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size)
    }

    /// Page `number`, clamped into the valid range. An empty sequence still
    /// has a (blank) first page.
    pub fn page(&self, number: usize) -> Page {
        let page_count = self.page_count();
        let number = number.clamp(1, page_count.max(1));
        let start_offset = (number - 1) * self.page_size;
        let end = (start_offset + self.page_size).min(self.total);

        Page {
            number,
            page_count,
            start_offset,
            range: start_offset.min(end)..end,
        }
    }

    /// Parse a `?page=` value; anything that is not a positive integer is page 1.
    pub fn page_from_query(&self, raw: Option<&str>) -> Page {
        let number = raw
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(1);
        self.page(number)
    }
}

impl Page {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.number < self.page_count
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn next_number(&self) -> Option<usize> {
        self.has_next().then(|| self.number + 1)
    }

    pub fn previous_number(&self) -> Option<usize> {
        self.has_previous().then(|| self.number - 1)
    }

    /// First and last absolute line numbers (1-based) on this page
    pub fn line_span(&self) -> Option<(usize, usize)> {
        (!self.is_empty()).then(|| (self.range.start + 1, self.range.end))
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range.start.min(items.len())..self.range.end.min(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_and_last_page_size() {
        for total in 0..350 {
            for page_size in [1, 7, 100] {
                let paginator = Paginator::new(total, page_size);
                let expected = (total + page_size - 1) / page_size;
                assert_eq!(paginator.page_count(), expected);

                if total > 0 {
                    let last = paginator.page(expected);
                    let remainder = total % page_size;
                    let expected_len = if remainder == 0 { page_size } else { remainder };
                    assert_eq!(last.len(), expected_len);
                }
            }
        }
    }

    #[test]
    fn test_windows_do_not_overlap() {
        let paginator = Paginator::new(250, 100);
        let mut covered = Vec::new();
        for number in 1..=paginator.page_count() {
            let page = paginator.page(number);
            assert_eq!(page.start_offset, (number - 1) * 100);
            covered.extend(page.range.clone());
        }
        assert_eq!(covered, (0..250).collect::<Vec<_>>());
    }

    #[test]
    fn test_clamping() {
        let paginator = Paginator::new(250, 100);

        assert_eq!(paginator.page(0).number, 1);
        assert_eq!(paginator.page(99).number, 3);
        assert_eq!(paginator.page(99).line_span(), Some((201, 250)));

        assert_eq!(paginator.page_from_query(Some("2")).number, 2);
        assert_eq!(paginator.page_from_query(Some("abc")).number, 1);
        assert_eq!(paginator.page_from_query(Some("-3")).number, 1);
        assert_eq!(paginator.page_from_query(None).number, 1);
    }

    #[test]
    fn test_navigation() {
        let paginator = Paginator::new(5, 2);

        let first = paginator.page(1);
        assert!(!first.has_previous());
        assert_eq!(first.next_number(), Some(2));

        let last = paginator.page(3);
        assert!(!last.has_next());
        assert_eq!(last.previous_number(), Some(2));
        assert_eq!(last.slice(&["a", "b", "c", "d", "e"]), &["e"]);
    }

    #[test]
    fn test_empty_sequence() {
        let paginator = Paginator::new(0, 100);
        let page = paginator.page(4);

        assert_eq!(paginator.page_count(), 0);
        assert_eq!(page.number, 1);
        assert!(page.is_empty());
        assert!(!page.has_next());
        assert_eq!(page.line_span(), None);
    }
}

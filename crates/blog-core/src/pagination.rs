//! Page-number pagination with silent clamping.
//!
//! A missing or non-integer page token yields the first page; any integer
//! outside `1..=num_pages` yields the last page. Callers never see an error.

use serde::Serialize;

/// Number of posts shown per list page.
pub const PAGE_SIZE: u64 = 3;

/// Page requested by the caller, as parsed from `?page=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    /// No token, or one that is not an integer.
    First,
    /// An integer token, not yet checked against the page range.
    Number(i64),
}

impl PageToken {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return PageToken::First;
        };
        if let Ok(n) = raw.parse::<i64>() {
            return PageToken::Number(n);
        }

        // Integers too wide for i64 are still integers: saturate them.
        let (negative, digits) = match raw.as_bytes().first() {
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            _ => (false, raw),
        };
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            PageToken::Number(if negative { i64::MIN } else { i64::MAX })
        } else {
            PageToken::First
        }
    }

    /// Resolve to a 1-based page number within `1..=num_pages`.
    pub fn resolve(self, num_pages: u64) -> u64 {
        let last = num_pages.max(1);
        match self {
            PageToken::First => 1,
            PageToken::Number(n) if n >= 1 && (n as u64) <= last => n as u64,
            PageToken::Number(_) => last,
        }
    }
}

/// A page request: which page and how large.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub token: PageToken,
    pub size: u64,
}

impl PageRequest {
    pub fn new(token: PageToken) -> Self {
        Self {
            token,
            size: PAGE_SIZE,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size.max(1);
        self
    }
}

/// Total pages for `count` items; an empty result still has one page.
pub fn num_pages(count: u64, page_size: u64) -> u64 {
    let page_size = page_size.max(1);
    count.div_ceil(page_size).max(1)
}

/// A single page of results.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Current page number (1-based).
    pub number: u64,
    pub num_pages: u64,
    /// Total number of items across all pages.
    pub count: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    /// Slice an already ordered, fully materialized sequence.
    pub fn from_items(items: Vec<T>, request: PageRequest) -> Self {
        let count = items.len() as u64;
        let num_pages = num_pages(count, request.size);
        let number = request.token.resolve(num_pages);
        let offset = ((number - 1) * request.size) as usize;

        let items = items
            .into_iter()
            .skip(offset)
            .take(request.size as usize)
            .collect();

        Self {
            items,
            number,
            num_pages,
            count,
            page_size: request.size,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: Option<&str>) -> PageRequest {
        PageRequest::new(PageToken::parse(raw))
    }

    #[test]
    fn test_non_integer_token_gives_first_page() {
        let page = Page::from_items((1..=6).collect::<Vec<_>>(), request(Some("abc")));
        assert_eq!(page.number, 1);
        assert_eq!(page.items, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_token_gives_first_page() {
        let page = Page::from_items((1..=6).collect::<Vec<_>>(), request(None));
        assert_eq!(page.number, 1);
    }

    #[test]
    fn test_out_of_range_gives_last_page() {
        let page = Page::from_items((1..=6).collect::<Vec<_>>(), request(Some("9999")));
        assert_eq!(page.num_pages, 2);
        assert_eq!(page.number, 2);
        assert_eq!(page.items, vec![4, 5, 6]);
    }

    #[test]
    fn test_integer_wider_than_i64_gives_last_page() {
        let items: Vec<i32> = (1..=6).collect();
        let huge = Page::from_items(items.clone(), request(Some("99999999999999999999")));
        assert_eq!(huge.number, 2);
        let tiny = Page::from_items(items.clone(), request(Some("-99999999999999999999")));
        assert_eq!(tiny.number, 2);
        assert_eq!(Page::from_items(items, request(Some("9999x"))).number, 1);
    }

    #[test]
    fn test_zero_and_negative_give_last_page() {
        let items: Vec<i32> = (1..=7).collect();
        assert_eq!(Page::from_items(items.clone(), request(Some("0"))).number, 3);
        assert_eq!(Page::from_items(items, request(Some("-2"))).number, 3);
    }

    #[test]
    fn test_partial_last_page() {
        let page = Page::from_items((1..=7).collect::<Vec<_>>(), request(Some("3")));
        assert_eq!(page.items, vec![7]);
        assert!(!page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn test_empty_sequence_has_one_page() {
        let page = Page::from_items(Vec::<i32>::new(), request(Some("5")));
        assert_eq!(page.num_pages, 1);
        assert_eq!(page.number, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_num_pages() {
        assert_eq!(num_pages(0, 3), 1);
        assert_eq!(num_pages(3, 3), 1);
        assert_eq!(num_pages(4, 3), 2);
    }
}

//! Page navigation of the list and trash views.

use serde::Serialize;

pub const DEFAULT_ITEMS_PER_PAGE: usize = 25;

/// How many page links surround the edges and the current page.
#[derive(Debug, Clone, Copy)]
pub struct PageWindow {
    pub edges: usize,
    pub before_current: usize,
    pub after_current: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            edges: 2,
            before_current: 2,
            after_current: 4,
        }
    }
}

impl PageWindow {
    /// Page numbers to link, `None` standing for an elided run.
    pub fn links(&self, current: usize, last: usize) -> Vec<Option<usize>> {
        if last == 0 {
            return Vec::new();
        }
        let mut shown: Vec<usize> = (1..=last.min(self.edges)).collect();
        let around = current.saturating_sub(self.before_current).max(1)
            ..=(current + self.after_current).min(last);
        shown.extend(around);
        shown.extend(last.saturating_sub(self.edges) + 1..=last);
        shown.sort_unstable();
        shown.dedup();

        let mut links = Vec::with_capacity(shown.len() + 2);
        let mut previous = 0;
        for number in shown {
            if number > previous + 1 {
                links.push(None);
            }
            links.push(Some(number));
            previous = number;
        }
        links
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pages: Vec<Option<usize>>,
    pub page: usize,
}

impl<T> Paginated<T> {
    /// Wraps one already fetched page.
    pub fn new(items: Vec<T>, current_page: usize, total_pages: usize) -> Self {
        let page = current_page.max(1);
        Self {
            items,
            pages: PageWindow::default().links(page, total_pages),
            page,
        }
    }

    /// Cuts page `current_page` out of every row of a view.
    pub fn slice(rows: Vec<T>, current_page: usize, per_page: usize) -> Self {
        let page = current_page.max(1);
        let total_pages = rows.len().div_ceil(per_page);
        let items = rows
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();
        Self::new(items, page, total_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_page_ranges_are_elided() {
        let links = PageWindow::default().links(10, 20);
        assert_eq!(
            links,
            vec![
                Some(1),
                Some(2),
                None,
                Some(8),
                Some(9),
                Some(10),
                Some(11),
                Some(12),
                Some(13),
                Some(14),
                None,
                Some(19),
                Some(20),
            ]
        );
    }

    #[test]
    fn short_ranges_list_every_page() {
        let links = PageWindow::default().links(1, 3);
        assert_eq!(links, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn slice_keeps_the_requested_page() {
        let page = Paginated::slice((1..=60).collect(), 3, DEFAULT_ITEMS_PER_PAGE);
        assert_eq!(page.items, (51..=60).collect::<Vec<_>>());
        assert_eq!(page.page, 3);
    }

    #[test]
    fn page_zero_is_the_first_page() {
        let page: Paginated<()> = Paginated::new(vec![], 0, 0);
        assert_eq!(page.page, 1);
        assert!(page.pages.is_empty());
    }
}

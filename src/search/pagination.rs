//! Windowed pagination
//!
//! Long result lists show the first pages, the pages around the current one
//! and the last page, with gaps in between.

use crate::models::{PageItem, PageLink, Pagination};

use super::result::RequestContext;

/// Page numbers and gaps to show for `num_pages` pages while on `page`
pub fn page_window(num_pages: u32, page: u32) -> Vec<PageItem> {
    let n = num_pages;
    if n == 0 {
        return Vec::new();
    }
    if n < 10 {
        return (1..=n).map(PageItem::Page).collect();
    }
    let page = page.clamp(1, n);

    let mut items = Vec::with_capacity(11);
    if page <= 5 {
        items.extend((1..=7).map(PageItem::Page));
        items.push(PageItem::Gap);
        items.push(PageItem::Page(n));
    } else if page.saturating_add(4) >= n {
        items.push(PageItem::Page(1));
        items.push(PageItem::Gap);
        items.extend((n - 6..=n).map(PageItem::Page));
    } else {
        items.push(PageItem::Page(1));
        items.push(PageItem::Gap);
        items.extend((page - 2..=page + 2).map(PageItem::Page));
        items.push(PageItem::Gap);
        items.push(PageItem::Page(n));
    }
    items
}

/// Pagination links for the current request.
///
/// Links keep every request parameter except `page`.
pub fn pagination_links(num_pages: u32, page: u32, request: &RequestContext) -> Pagination {
    let base = request.url_without("page");
    let link = |n: u32| format!("{}page={}", base, n);

    let pages = page_window(num_pages, page)
        .into_iter()
        .map(|item| match item {
            PageItem::Page(n) => PageLink {
                page: item.to_string(),
                url: link(n),
                current: n == page,
            },
            PageItem::Gap => PageLink {
                page: item.to_string(),
                url: String::new(),
                current: false,
            },
        })
        .collect();

    Pagination {
        pages,
        prev: (page > 1 && page <= num_pages).then(|| link(page - 1)),
        next: (page < num_pages).then(|| link(page.saturating_add(1))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pages(items: &[PageItem]) -> String {
        items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_small_page_counts() {
        assert!(page_window(0, 1).is_empty());
        assert_eq!(pages(&page_window(1, 1)), "1");
        assert_eq!(pages(&page_window(9, 5)), "1 2 3 4 5 6 7 8 9");
    }

    #[test]
    fn test_window_positions() {
        assert_eq!(pages(&page_window(20, 1)), "1 2 3 4 5 6 7 ... 20");
        assert_eq!(pages(&page_window(20, 5)), "1 2 3 4 5 6 7 ... 20");
        assert_eq!(pages(&page_window(20, 10)), "1 ... 8 9 10 11 12 ... 20");
        assert_eq!(pages(&page_window(20, 16)), "1 ... 14 15 16 17 18 19 20");
        assert_eq!(pages(&page_window(20, 20)), "1 ... 14 15 16 17 18 19 20");
        assert_eq!(pages(&page_window(10, 6)), "1 ... 4 5 6 7 8 9 10");
    }

    #[test]
    fn test_links_keep_parameters() {
        let request = RequestContext::new(
            "/search",
            vec![
                ("q".to_string(), "old man".to_string()),
                ("page".to_string(), "2".to_string()),
            ],
        );
        let pagination = pagination_links(3, 2, &request);

        assert_eq!(pagination.pages.len(), 3);
        assert_eq!(pagination.pages[0].url, "/search?q=old%20man&page=1");
        assert!(pagination.pages[1].current);
        assert_eq!(pagination.prev.as_deref(), Some("/search?q=old%20man&page=1"));
        assert_eq!(pagination.next.as_deref(), Some("/search?q=old%20man&page=3"));
    }

    #[test]
    fn test_no_prev_or_next_at_edges() {
        let request = RequestContext::new("/search", Vec::new());
        let first = pagination_links(1, 1, &request);
        assert_eq!(first.prev, None);
        assert_eq!(first.next, None);
        assert!(pagination_links(0, 1, &request).pages.is_empty());
    }

    proptest! {
        #[test]
        fn prop_window_is_ordered_and_bounded(num_pages in 1u32..500, offset in 0u32..500) {
            let page = offset % num_pages + 1;
            let items = page_window(num_pages, page);
            let numbers: Vec<u32> = items
                .iter()
                .filter_map(|i| match i { PageItem::Page(n) => Some(*n), PageItem::Gap => None })
                .collect();

            prop_assert!(items.len() <= 11);
            prop_assert_eq!(numbers.first().copied(), Some(1));
            prop_assert_eq!(numbers.last().copied(), Some(num_pages));
            prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(numbers.contains(&page));
            prop_assert!(numbers.iter().all(|n| (1..=num_pages).contains(n)));
        }

        #[test]
        fn prop_window_survives_pages_past_the_end(num_pages in 0u32..500, page in any::<u32>()) {
            let items = page_window(num_pages, page);
            prop_assert!(items.len() <= 11);
            let all_in_range = items.iter().all(|i| match i {
                PageItem::Page(n) => (1..=num_pages).contains(n),
                PageItem::Gap => true,
            });
            prop_assert!(all_in_range);
            let request = RequestContext::new("/search", Vec::new());
            let links = pagination_links(num_pages, page, &request);
            prop_assert_eq!(links.next.is_some(), page < num_pages);
        }

        #[test]
        fn prop_gaps_hide_pages(num_pages in 10u32..500, offset in 0u32..500) {
            let page = offset % num_pages + 1;
            let items = page_window(num_pages, page);
            for pair in items.windows(3) {
                if let [PageItem::Page(a), PageItem::Gap, PageItem::Page(b)] = pair {
                    prop_assert!(b - a > 1);
                }
            }
            prop_assert!(!items.windows(2).any(|w| w[0] == PageItem::Gap && w[1] == PageItem::Gap));
        }
    }
}

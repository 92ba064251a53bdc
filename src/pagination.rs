//! Page planning.

use crate::engine::{EngineProfile, PageStyle};

/// Number of pages to request for `total_count` items, after the page cap.
pub fn page_count(total_count: u64, results_per_page: u64, max_pages: u64) -> u64 {
    if total_count == 0 || results_per_page == 0 {
        return 0;
    }
    total_count.div_ceil(results_per_page).min(max_pages)
}

/// Plans the page cursors for a query with `total_count` results.
///
/// Page-index engines get `1..=pages`; offset engines get
/// `0, n, 2n, ..` with `n` the page size.
pub fn plan(total_count: u64, profile: &EngineProfile) -> Vec<u64> {
    let pages = page_count(total_count, profile.results_per_page, profile.max_pages);
    match profile.page_style {
        PageStyle::PageIndex => (1..=pages).collect(),
        PageStyle::Offset => (0..pages).map(|page| page * profile.results_per_page).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(style: PageStyle, per_page: u64) -> EngineProfile {
        EngineProfile {
            page_style: style,
            results_per_page: per_page,
            ..Default::default()
        }
    }

    #[test]
    fn test_page_count_zero_total() {
        assert_eq!(page_count(0, 20, 2500), 0);
    }

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(page_count(45, 20, 2500), 3);
        assert_eq!(page_count(40, 20, 2500), 2);
        assert_eq!(page_count(1, 100, 2500), 1);
    }

    #[test]
    fn test_page_count_capped() {
        assert_eq!(page_count(1_000_000, 100, 2500), 2500);
        assert_eq!(page_count(45, 20, 2), 2);
    }

    #[test]
    fn test_plan_page_index() {
        assert_eq!(plan(45, &profile(PageStyle::PageIndex, 20)), vec![1, 2, 3]);
    }

    #[test]
    fn test_plan_offset() {
        assert_eq!(plan(45, &profile(PageStyle::Offset, 20)), vec![0, 20, 40]);
    }

    #[test]
    fn test_plan_empty_for_zero_total() {
        assert!(plan(0, &profile(PageStyle::PageIndex, 20)).is_empty());
        assert!(plan(0, &profile(PageStyle::Offset, 20)).is_empty());
    }

    #[test]
    fn test_plan_offset_capped() {
        let profile = profile(PageStyle::Offset, 20).with_max_pages(2);
        assert_eq!(plan(1000, &profile), vec![0, 20]);
    }

    #[test]
    fn test_plan_page_index_capped_at_default_ceiling() {
        let cursors = plan(10_000_000, &profile(PageStyle::PageIndex, 100));
        assert_eq!(cursors.len(), 2500);
        assert_eq!(cursors.first(), Some(&1));
        assert_eq!(cursors.last(), Some(&2500));
    }

    #[test]
    fn test_plan_matches_ceiling_division() {
        for total in 1..=250u64 {
            for per_page in [1u64, 7, 20, 100] {
                let expected = (total + per_page - 1) / per_page;
                let cursors = plan(total, &profile(PageStyle::Offset, per_page));
                assert_eq!(cursors.len() as u64, expected);
                assert_eq!(
                    cursors.last().copied(),
                    Some((expected - 1) * per_page)
                );
            }
        }
    }
}

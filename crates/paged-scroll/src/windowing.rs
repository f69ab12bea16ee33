//! Windowing Math Module
//!
//! Pure functions for sliding-window pagination: shift triggers, keep-page
//! selection, scroll anchors, and page merging. Stateful orchestration lives
//! in [`crate::PagedScrollList`]; everything here runs without a renderer.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::{PageWindow, Resident, ScrollAnchor, ScrollItem, SortOrder, Viewport};

// ============================================================================
// Direction & Trigger Logic
// ============================================================================

/// Direction of travel, as seen by the scroll container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// Toward smaller scroll offsets (earlier pages)
    Up,
    /// Toward larger scroll offsets (later pages)
    Down,
}

/// Result of checking whether a scroll position should shift the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// No window shift needed
    None,
    /// Load `target_page` and slide the window toward `direction`
    Slide {
        direction: ScrollDirection,
        target_page: usize,
    },
}

/// Check whether the current scroll position warrants a window shift.
///
/// Down: within `edge_threshold_px` of the content bottom and a later page
/// exists. Up: within `edge_threshold_px` of the top and `window.start > 0`.
pub fn check_trigger<Id>(
    viewport: &Viewport<Id>,
    direction: ScrollDirection,
    edge_threshold_px: f64,
    window: PageWindow,
    total_pages: usize,
) -> Trigger {
    match direction {
        ScrollDirection::Down => {
            let bottom_gap =
                viewport.content_height - viewport.scroll_top - viewport.viewport_height;
            if bottom_gap < edge_threshold_px && window.end + 1 < total_pages {
                return Trigger::Slide {
                    direction,
                    target_page: window.end + 1,
                };
            }
        }
        ScrollDirection::Up => {
            if viewport.scroll_top < edge_threshold_px && window.start > 0 {
                return Trigger::Slide {
                    direction,
                    target_page: window.start - 1,
                };
            }
        }
    }
    Trigger::None
}

/// Pages that stay resident after sliding toward `target_page`.
///
/// The window is capped at two pages: the page at the edge being approached
/// stays, the page at the far edge is evicted.
pub fn keep_pages(
    window: PageWindow,
    target_page: usize,
    direction: ScrollDirection,
) -> [usize; 2] {
    match direction {
        ScrollDirection::Down => [window.end, target_page],
        ScrollDirection::Up => [target_page, window.start],
    }
}

// ============================================================================
// Scroll Anchors
// ============================================================================

/// Select the anchor row for a window shift: the first row whose top edge is
/// at or past the current scroll offset.
///
/// Downward shifts record the row's absolute offset (restored by delta);
/// upward shifts record its offset from the viewport top (restored
/// absolutely). Rows must be in rendered order. Returns `None` when nothing
/// is rendered at or below the scroll offset.
pub fn select_anchor<Id: Clone>(
    viewport: &Viewport<Id>,
    direction: ScrollDirection,
) -> Option<ScrollAnchor<Id>> {
    let row = viewport.rows.iter().find(|r| r.top >= viewport.scroll_top)?;
    let reference_px = match direction {
        ScrollDirection::Down => row.top,
        ScrollDirection::Up => row.top - viewport.scroll_top,
    };
    Some(ScrollAnchor {
        item_id: row.id.clone(),
        reference_px,
        direction,
    })
}

/// Compute the scroll offset that puts the anchor row back where it was.
///
/// `new_top` is the anchor row's offset after re-layout; `None` means the
/// anchor is no longer resident and the position is left alone.
pub fn restore_scroll_top<Id>(
    anchor: &ScrollAnchor<Id>,
    old_scroll_top: f64,
    new_top: Option<f64>,
) -> Option<f64> {
    let new_top = new_top?;
    match anchor.direction {
        ScrollDirection::Down => Some(old_scroll_top + (new_top - anchor.reference_px)),
        ScrollDirection::Up => Some(new_top - anchor.reference_px),
    }
}

// ============================================================================
// Page Merging
// ============================================================================

/// Merge a freshly fetched page into the resident set.
///
/// Evicts residents outside `keep_only` (when given) or residents of the
/// re-fetched page (otherwise), drops any retained item that reappears in the
/// fetched content, tags the new items with `page`, and re-sorts. Each id
/// appears at most once in the result.
pub fn merge_page<I: ScrollItem>(
    existing: Vec<Resident<I>>,
    fetched: Vec<I>,
    page: usize,
    keep_only: Option<&[usize]>,
    order: SortOrder,
) -> Vec<Resident<I>> {
    let fresh: HashSet<I::Id> = fetched.iter().map(ScrollItem::id).collect();
    let mut merged: Vec<Resident<I>> = existing
        .into_iter()
        .filter(|r| {
            let retained = match keep_only {
                Some(keep) => keep.contains(&r.page) && r.page != page,
                None => r.page != page,
            };
            retained && !fresh.contains(&r.item.id())
        })
        .collect();
    merged.extend(fetched.into_iter().map(|item| Resident { item, page }));
    sort_residents(&mut merged, order);
    merged
}

/// Stable sort of the resident set by item sort key.
pub fn sort_residents<I: ScrollItem>(residents: &mut [Resident<I>], order: SortOrder) {
    residents.sort_by(|a, b| {
        let ord = a.item.order_key().cmp(&b.item.order_key());
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

// ============================================================================
// Scroll Rate Limiting
// ============================================================================

/// Leading-edge rate limiter for scroll handling.
///
/// Continuous scroll streams collapse to at most one handled event per
/// `min_interval`.
#[derive(Debug, Clone)]
pub struct RateLimit {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimit {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Record an event at `now`; returns false while inside the quiet window.
    pub fn ready(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

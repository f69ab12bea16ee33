//! Test utilities for paged-scroll integration tests
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::Level;

pub use paged_scroll::{
    Command, Effect, LocatedPage, PageFetcher, PageResult, PageWindow, PagedScrollList, Resident,
    Row, ScrollAnchor, ScrollConfig, ScrollError, ScrollItem, SortOrder, Viewport,
};

/// Test message model for scroll testing
#[derive(Debug, Clone, PartialEq)]
pub struct TestMessage {
    pub id: u64,
    pub sent_at: i64,
}

impl ScrollItem for TestMessage {
    type Id = u64;
    type Key = i64;

    fn id(&self) -> u64 {
        self.id
    }

    fn order_key(&self) -> i64 {
        self.sent_at
    }
}

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        let level = level.parse::<Level>().unwrap_or(Level::INFO);
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_test_writer()
            .try_init();
    }
}

// ============================================================================
// TestBackend
// ============================================================================

struct BackendState {
    messages: Vec<TestMessage>,
    lookup_enabled: bool,
    fail_next_fetch: bool,
    fail_page: Option<usize>,
    fetch_log: Vec<usize>,
}

/// In-memory paginated server implementing the page fetcher contract.
///
/// Pages are `page_size` slices over the message list in insertion order.
/// `total_pages` is recomputed on every call, so server-side growth between
/// fetches is observable mid-test, and a single fetch failure can be injected.
#[derive(Clone)]
pub struct TestBackend {
    page_size: usize,
    state: Arc<Mutex<BackendState>>,
}

impl TestBackend {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            state: Arc::new(Mutex::new(BackendState {
                messages: Vec::new(),
                lookup_enabled: true,
                fail_next_fetch: false,
                fail_page: None,
                fetch_log: Vec::new(),
            })),
        }
    }

    /// Backend seeded with messages `1..=count`, sent at `1000 + id`.
    pub fn seeded(page_size: usize, count: u64) -> Self {
        let backend = Self::new(page_size);
        for _ in 0..count {
            backend.push();
        }
        backend
    }

    /// Append the next message server-side and return it.
    pub fn push(&self) -> TestMessage {
        let mut state = self.state.lock().unwrap();
        let id = state.messages.last().map(|m| m.id + 1).unwrap_or(1);
        let message = TestMessage {
            id,
            sent_at: 1000 + id as i64,
        };
        state.messages.push(message.clone());
        message
    }

    pub fn remove(&self, id: u64) {
        self.state.lock().unwrap().messages.retain(|m| m.id != id);
    }

    /// Disable the item lookup endpoint, forcing the scan fallback.
    pub fn without_lookup(self) -> Self {
        self.state.lock().unwrap().lookup_enabled = false;
        self
    }

    /// Make the next `fetch_page` call fail.
    pub fn fail_next_fetch(&self) {
        self.state.lock().unwrap().fail_next_fetch = true;
    }

    /// Make the next `fetch_page` call for one specific page fail.
    pub fn fail_on_page(&self, page: usize) {
        self.state.lock().unwrap().fail_page = Some(page);
    }

    /// Pages requested so far, in order (probe fetches included).
    pub fn fetch_log(&self) -> Vec<usize> {
        self.state.lock().unwrap().fetch_log.clone()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }
}

#[async_trait::async_trait]
impl PageFetcher<TestMessage> for TestBackend {
    async fn fetch_page(&self, page: usize) -> Result<PageResult<TestMessage>, ScrollError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_log.push(page);
        if state.fail_next_fetch {
            state.fail_next_fetch = false;
            return Err(ScrollError::fetch("injected fetch failure"));
        }
        if state.fail_page == Some(page) {
            state.fail_page = None;
            return Err(ScrollError::fetch("injected fetch failure"));
        }
        let total_pages = state.messages.len().div_ceil(self.page_size);
        let content: Vec<TestMessage> = state
            .messages
            .iter()
            .skip(page * self.page_size)
            .take(self.page_size)
            .cloned()
            .collect();
        Ok(PageResult {
            content,
            total_pages,
            last: page + 1 >= total_pages,
            number: Some(page),
        })
    }

    async fn locate_page(
        &self,
        item_id: &u64,
        page_size: usize,
    ) -> Result<LocatedPage<TestMessage>, ScrollError> {
        let state = self.state.lock().unwrap();
        if !state.lookup_enabled {
            return Err(ScrollError::LookupUnsupported);
        }
        let index = state
            .messages
            .iter()
            .position(|m| m.id == *item_id)
            .ok_or_else(|| ScrollError::fetch("no page contains the item"))?;
        let number = index / page_size;
        let content: Vec<TestMessage> = state
            .messages
            .iter()
            .skip(number * page_size)
            .take(page_size)
            .cloned()
            .collect();
        Ok(LocatedPage {
            content,
            number,
            total_pages: state.messages.len().div_ceil(page_size),
        })
    }
}

// ============================================================================
// Surface
// ============================================================================

/// Simulates the scroll container: uniform-height rows over the resident
/// list, a scroll offset, and effect application (anchor restore, scroll to
/// bottom/top/item). Stands in for the render adapter the list is designed
/// to drive.
pub struct Surface {
    pub row_height: f64,
    pub viewport_height: f64,
    pub scroll_top: f64,
}

impl Surface {
    pub fn new(row_height: f64, viewport_height: f64) -> Self {
        Self {
            row_height,
            viewport_height,
            scroll_top: 0.0,
        }
    }

    pub fn content_height(&self, items: &[Resident<TestMessage>]) -> f64 {
        items.len() as f64 * self.row_height
    }

    /// Build viewport geometry for the current resident list.
    pub fn viewport(&self, items: &[Resident<TestMessage>]) -> Viewport<u64> {
        let rows = items
            .iter()
            .enumerate()
            .map(|(index, r)| Row {
                id: r.item.id,
                top: index as f64 * self.row_height,
                height: self.row_height,
            })
            .collect();
        Viewport {
            scroll_top: self.scroll_top,
            viewport_height: self.viewport_height,
            content_height: self.content_height(items),
            rows,
        }
    }

    /// Scroll to an absolute offset, clamped to the content range.
    pub fn scroll_to(&mut self, items: &[Resident<TestMessage>], top: f64) {
        let max = (self.content_height(items) - self.viewport_height).max(0.0);
        self.scroll_top = top.clamp(0.0, max);
    }

    pub fn scroll_to_bottom(&mut self, items: &[Resident<TestMessage>]) {
        self.scroll_to(items, f64::MAX);
    }

    fn row_top(&self, items: &[Resident<TestMessage>], id: u64) -> Option<f64> {
        items
            .iter()
            .position(|r| r.item.id == id)
            .map(|index| index as f64 * self.row_height)
    }

    /// Offset of a row relative to the viewport top.
    pub fn viewport_offset_of(&self, items: &[Resident<TestMessage>], id: u64) -> Option<f64> {
        self.row_top(items, id).map(|top| top - self.scroll_top)
    }

    /// Apply drained effects against post-update geometry, the way a real
    /// adapter would after re-layout.
    pub fn apply_effects(&mut self, items: &[Resident<TestMessage>], effects: &[Effect<u64>]) {
        for effect in effects {
            match effect {
                Effect::RestoreAnchor(anchor) => {
                    if let Some(top) = paged_scroll::windowing::restore_scroll_top(
                        anchor,
                        self.scroll_top,
                        self.row_top(items, anchor.item_id),
                    ) {
                        let max = (self.content_height(items) - self.viewport_height).max(0.0);
                        self.scroll_top = top.clamp(0.0, max);
                    }
                }
                Effect::ScrollToBottom => self.scroll_to_bottom(items),
                Effect::ScrollToTop => self.scroll_top = 0.0,
                Effect::ScrollToItem(id) => {
                    if let Some(top) = self.row_top(items, *id) {
                        let centered = top - (self.viewport_height - self.row_height) / 2.0;
                        let max = (self.content_height(items) - self.viewport_height).max(0.0);
                        self.scroll_top = centered.clamp(0.0, max);
                    }
                }
            }
        }
    }
}

// ============================================================================
// Drivers & assertion helpers
// ============================================================================

/// Monotonic clock for driving the scroll rate limiter deterministically.
pub struct Clock {
    now: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
        }
    }

    /// Advance past the debounce interval and return the new instant.
    pub fn tick(&mut self) -> Instant {
        self.step(Duration::from_millis(150))
    }

    pub fn step(&mut self, by: Duration) -> Instant {
        self.now += by;
        self.now
    }
}

/// Scroll the surface, feed the event to the list, and apply the resulting
/// effects after the (simulated) re-render. Returns whether a page load
/// happened and the effects that were applied.
pub async fn scroll_and_handle(
    list: &mut PagedScrollList<TestMessage, TestBackend>,
    surface: &mut Surface,
    to: f64,
    at: Instant,
) -> Result<(bool, Vec<Effect<u64>>), ScrollError> {
    let before = list.items().to_vec();
    surface.scroll_to(&before, to);
    let viewport = surface.viewport(&before);
    let loaded = list.handle_scroll(&viewport, at).await?;
    let effects = list.take_effects();
    surface.apply_effects(list.items(), &effects);
    Ok((loaded, effects))
}

pub fn ids(items: &[Resident<TestMessage>]) -> Vec<u64> {
    items.iter().map(|r| r.item.id).collect()
}

pub fn resident_pages(items: &[Resident<TestMessage>]) -> BTreeSet<usize> {
    items.iter().map(|r| r.page).collect()
}

/// Every resident page tag lies inside the window bounds.
pub fn residency_within(items: &[Resident<TestMessage>], window: PageWindow) -> bool {
    items.iter().all(|r| window.contains(r.page))
}

pub fn is_sorted(items: &[Resident<TestMessage>], order: SortOrder) -> bool {
    items.windows(2).all(|pair| match order {
        SortOrder::Ascending => pair[0].item.sent_at <= pair[1].item.sent_at,
        SortOrder::Descending => pair[0].item.sent_at >= pair[1].item.sent_at,
    })
}

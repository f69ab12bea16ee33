//! Paged Scroll - platform-agnostic sliding-window pagination state machine

pub mod windowing;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use windowing::{ScrollDirection, Trigger};

// ============================================================================
// Core Types
// ============================================================================

/// Minimal item interface the windowing logic depends on.
///
/// Items are otherwise opaque payloads (comments, chat messages); the list
/// never inspects any other field.
pub trait ScrollItem: Clone + Send + Sync {
    /// Stable unique identifier.
    type Id: Clone + Eq + Hash + Debug + Send + Sync;
    /// Orderable key the server pages by, typically a creation timestamp.
    type Key: Ord;

    fn id(&self) -> Self::Id;
    fn order_key(&self) -> Self::Key;
}

/// Display order of the merged resident list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first (comment threads)
    Ascending,
    /// Newest first (notification feeds)
    Descending,
}

/// An item currently held in the windowed cache, tagged with the server page
/// it was last fetched as part of. The tag is overwritten whenever that page
/// is re-fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Resident<I> {
    pub item: I,
    pub page: usize,
}

/// Inclusive range of resident page indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
}

impl PageWindow {
    pub fn single(page: usize) -> Self {
        Self {
            start: page,
            end: page,
        }
    }

    pub fn contains(&self, page: usize) -> bool {
        self.start <= page && page <= self.end
    }

    pub fn page_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// One page of items plus pagination metadata, as returned by the server.
#[derive(Debug, Clone)]
pub struct PageResult<I> {
    pub content: Vec<I>,
    /// Authoritative page count at the time of the response. May change
    /// between calls; the list re-adopts it on every fetch.
    pub total_pages: usize,
    /// True when this is the final page.
    pub last: bool,
    /// Server-reported page index, when the backend echoes it.
    pub number: Option<usize>,
}

/// The page a looked-up item lives on.
#[derive(Debug, Clone)]
pub struct LocatedPage<I> {
    pub content: Vec<I>,
    pub number: usize,
    pub total_pages: usize,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScrollError {
    /// The underlying page fetch failed; resident state is unchanged.
    #[error("page fetch failed: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The fetcher has no server-side item lookup.
    #[error("item lookup is not supported by this fetcher")]
    LookupUnsupported,
}

impl ScrollError {
    /// Wrap an upstream transport or client error.
    pub fn fetch(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Fetch(err.into())
    }
}

// ============================================================================
// Fetcher Contract
// ============================================================================

/// Server pagination contract consumed by the list.
///
/// Implementations are scoped to one container (a post's comments, a chat
/// room's messages); whatever container id the backend needs lives inside the
/// implementation.
#[async_trait]
pub trait PageFetcher<I: ScrollItem> {
    /// Fetch one zero-indexed page.
    async fn fetch_page(&self, page: usize) -> Result<PageResult<I>, ScrollError>;

    /// Resolve the page containing `item_id`, for jump navigation.
    ///
    /// The default declines, which routes jumps through the linear-scan
    /// fallback.
    async fn locate_page(
        &self,
        _item_id: &I::Id,
        _page_size: usize,
    ) -> Result<LocatedPage<I>, ScrollError> {
        Err(ScrollError::LookupUnsupported)
    }
}

// ============================================================================
// Adapter Geometry & Effects
// ============================================================================

/// Geometry of one rendered row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<Id> {
    pub id: Id,
    /// Top edge offset within the scroll content, px
    pub top: f64,
    pub height: f64,
}

/// Scroll container geometry reported by the render adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport<Id> {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
    /// Rendered rows, ordered top to bottom
    pub rows: Vec<Row<Id>>,
}

/// Visual reference point captured immediately before a window shift and
/// consumed immediately after the post-shift re-layout. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollAnchor<Id> {
    pub item_id: Id,
    /// Down: the row's absolute offset. Up: its offset from the viewport top.
    pub reference_px: f64,
    pub direction: ScrollDirection,
}

/// Side effects for the render adapter, drained via
/// [`PagedScrollList::take_effects`].
///
/// `RestoreAnchor` must be applied after re-layout: the offsets captured in
/// the anchor are only comparable to post-render geometry. Pass the anchor
/// and the anchor row's new offset to [`windowing::restore_scroll_top`].
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<Id> {
    RestoreAnchor(ScrollAnchor<Id>),
    ScrollToBottom,
    ScrollToTop,
    /// Scroll the item into view, centered
    ScrollToItem(Id),
}

/// Imperative list operations, as data, so a UI binding can forward them
/// through a single dispatch seam.
#[derive(Debug, Clone, PartialEq)]
pub enum Command<Id> {
    ScrollToBottomAndLoadLastPage,
    ReloadPage { page: usize },
    ScrollToItem { item_id: Id },
    ScrollToPage { page: usize, item_id: Option<Id> },
}

// ============================================================================
// Configuration
// ============================================================================

/// How long a jump-target highlight stays applied before the adapter clears
/// it with [`PagedScrollList::clear_highlight`].
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Server page size; also used for local item partitioning and lookups
    pub page_size: usize,
    pub sort_order: SortOrder,
    /// Page loaded by [`PagedScrollList::start`]
    pub initial_page: usize,
    /// Distance from either content edge, in pixels, that arms a window shift
    pub edge_threshold_px: f64,
    /// Minimum interval between handled scroll events
    pub scroll_debounce: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            sort_order: SortOrder::Ascending,
            initial_page: 0,
            edge_threshold_px: 10.0,
            scroll_debounce: Duration::from_millis(100),
        }
    }
}

// ============================================================================
// PagedScrollList
// ============================================================================

/// Sliding-window paged scroll list state machine.
///
/// Owns the merged, sorted, deduplicated resident item list and the window
/// bounds (at most two server pages). A render adapter feeds it viewport
/// geometry through [`handle_scroll`](Self::handle_scroll), issues
/// [`Command`]s through [`dispatch`](Self::dispatch), and drains [`Effect`]s
/// after every operation. The adapter only reads list state; nothing else
/// mutates it.
pub struct PagedScrollList<I: ScrollItem, F: PageFetcher<I>> {
    fetcher: F,
    config: ScrollConfig,
    items: Vec<Resident<I>>,
    window: Option<PageWindow>,
    loaded_pages: BTreeSet<usize>,
    total_pages: usize,
    loading: bool,
    local_mode: bool,
    highlighted: Option<I::Id>,
    effects: Vec<Effect<I::Id>>,
    last_scroll_top: f64,
    rate_limit: windowing::RateLimit,
}

impl<I: ScrollItem, F: PageFetcher<I> + Sync> PagedScrollList<I, F> {
    pub fn new(fetcher: F, config: ScrollConfig) -> Self {
        let rate_limit = windowing::RateLimit::new(config.scroll_debounce);
        Self {
            fetcher,
            config,
            items: Vec::new(),
            window: None,
            loaded_pages: BTreeSet::new(),
            total_pages: 1,
            loading: false,
            local_mode: false,
            highlighted: None,
            effects: Vec::new(),
            last_scroll_top: 0.0,
            rate_limit,
        }
    }

    /// Load the configured initial page. Callers that start empty (e.g. a
    /// list fed by [`set_local_items`](Self::set_local_items)) skip this.
    pub async fn start(&mut self) -> Result<(), ScrollError> {
        self.load_page_with(self.config.initial_page, false, None)
            .await?;
        Ok(())
    }

    // Accessors

    /// Merged resident items in display order.
    pub fn items(&self) -> &[Resident<I>] {
        &self.items
    }

    pub fn window(&self) -> Option<PageWindow> {
        self.window
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True while later pages exist beyond the window.
    pub fn has_more(&self) -> bool {
        match self.window {
            Some(w) => w.end + 1 < self.total_pages,
            None => self.total_pages > 0,
        }
    }

    /// True once the window reaches the final page ("no more" footer state).
    pub fn at_end(&self) -> bool {
        !self.has_more()
    }

    /// Jump-target item currently flagged for the transient highlight.
    pub fn highlighted(&self) -> Option<&I::Id> {
        self.highlighted.as_ref()
    }

    /// Adapter callback once [`HIGHLIGHT_DURATION`] has elapsed.
    pub fn clear_highlight(&mut self) {
        self.highlighted = None;
    }

    /// Drain pending adapter effects, in the order they were produced.
    pub fn take_effects(&mut self) -> Vec<Effect<I::Id>> {
        std::mem::take(&mut self.effects)
    }

    /// Page tag of a resident item, for targeted reloads after a mutation.
    pub fn resident_page_of(&self, id: &I::Id) -> Option<usize> {
        self.items.iter().find(|r| r.item.id() == *id).map(|r| r.page)
    }

    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    // Scroll-driven window shifts

    /// Handle a scroll event from the render adapter.
    ///
    /// Rate-limited to one handled event per configured debounce interval.
    /// Determines scroll direction from the previously handled offset, checks
    /// the shift trigger, and on a shift captures the anchor, loads the
    /// target page with the two-page keep set, and emits
    /// [`Effect::RestoreAnchor`]. Returns whether a page load happened.
    pub async fn handle_scroll(
        &mut self,
        viewport: &Viewport<I::Id>,
        now: Instant,
    ) -> Result<bool, ScrollError> {
        if !self.rate_limit.ready(now) {
            return Ok(false);
        }
        let direction = if viewport.scroll_top > self.last_scroll_top {
            ScrollDirection::Down
        } else {
            ScrollDirection::Up
        };
        self.last_scroll_top = viewport.scroll_top;

        let Some(window) = self.window else {
            return Ok(false);
        };
        if self.loading || self.local_mode {
            return Ok(false);
        }

        let trigger = windowing::check_trigger(
            viewport,
            direction,
            self.config.edge_threshold_px,
            window,
            self.total_pages,
        );
        let Trigger::Slide {
            direction,
            target_page,
        } = trigger
        else {
            return Ok(false);
        };

        tracing::debug!(
            ?direction,
            target_page,
            start = window.start,
            end = window.end,
            total_pages = self.total_pages,
            "window shift triggered"
        );

        // Anchor geometry is only valid pre-shift; capture before the fetch.
        let anchor = windowing::select_anchor(viewport, direction);
        let keep = windowing::keep_pages(window, target_page, direction);
        let loaded = self.load_page_with(target_page, false, Some(&keep)).await?;
        if loaded {
            if let Some(anchor) = anchor {
                self.effects.push(Effect::RestoreAnchor(anchor));
            }
        }
        Ok(loaded)
    }

    // Imperative operations

    /// Route a [`Command`] to the matching operation.
    pub async fn dispatch(&mut self, command: Command<I::Id>) -> Result<(), ScrollError> {
        match command {
            Command::ScrollToBottomAndLoadLastPage => {
                self.scroll_to_bottom_and_load_last_page().await
            }
            Command::ReloadPage { page } => self.reload_page(page).await.map(|_| ()),
            Command::ScrollToItem { item_id } => self.scroll_to_item(&item_id).await,
            Command::ScrollToPage { page, item_id } => {
                self.scroll_to_page(page, item_id.as_ref()).await
            }
        }
    }

    /// Load a page unless it is already resident.
    pub async fn load_page(&mut self, page: usize) -> Result<bool, ScrollError> {
        self.load_page_with(page, false, None).await
    }

    /// Force-refetch one page in place, e.g. after a like or delete mutated
    /// it server-side.
    pub async fn reload_page(&mut self, page: usize) -> Result<bool, ScrollError> {
        self.load_page_with(page, true, None).await
    }

    /// Re-derive the true last page from an authoritative probe fetch, load
    /// it (plus the second-to-last page when distinct) into a two-page
    /// window, and emit [`Effect::ScrollToBottom`].
    ///
    /// Used after the current actor submits an item: the item's page may not
    /// have existed in the previously loaded window, and the locally cached
    /// page count may be stale after concurrent writes elsewhere.
    pub async fn scroll_to_bottom_and_load_last_page(&mut self) -> Result<(), ScrollError> {
        if self.local_mode {
            self.effects.push(Effect::ScrollToBottom);
            return Ok(());
        }
        let probe = self
            .fetcher
            .fetch_page(self.total_pages.saturating_sub(1))
            .await?;
        self.total_pages = probe.total_pages;
        if self.total_pages == 0 {
            return Ok(());
        }
        let last = self.total_pages - 1;
        let second_last = last.saturating_sub(1);
        let keep: Vec<usize> = if second_last == last {
            vec![last]
        } else {
            vec![second_last, last]
        };
        self.load_page_with(last, true, Some(&keep)).await?;
        if second_last != last {
            self.load_page_with(second_last, true, Some(&keep)).await?;
        }
        self.effects.push(Effect::ScrollToBottom);
        Ok(())
    }

    /// Jump to an item that is not necessarily resident: resolve its page via
    /// the fetcher lookup, or fall back to a bounded linear scan. On success
    /// the window collapses to the containing page and the item is scrolled
    /// into view and highlighted. An item absent from every page completes
    /// without error and without scrolling.
    pub async fn scroll_to_item(&mut self, item_id: &I::Id) -> Result<(), ScrollError> {
        if self.local_mode {
            if self.resident_page_of(item_id).is_some() {
                self.focus_item(item_id.clone());
            }
            return Ok(());
        }
        let located = self
            .fetcher
            .locate_page(item_id, self.config.page_size)
            .await;
        match located {
            Ok(located) => {
                let page = located.number;
                self.items = windowing::merge_page(
                    Vec::new(),
                    located.content,
                    page,
                    Some(&[page]),
                    self.config.sort_order,
                );
                self.loaded_pages = BTreeSet::from([page]);
                self.window = Some(PageWindow::single(page));
                self.total_pages = located.total_pages.max(1);
                if self.resident_page_of(item_id).is_some() {
                    self.focus_item(item_id.clone());
                }
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, "page lookup failed, falling back to linear scan");
                self.scan_for_item(item_id).await
            }
        }
    }

    /// Force-load an exact page, then scroll to `item_id` (when resident) or
    /// to the top.
    pub async fn scroll_to_page(
        &mut self,
        page: usize,
        item_id: Option<&I::Id>,
    ) -> Result<(), ScrollError> {
        if !self.local_mode {
            self.load_page_with(page, true, Some(&[page])).await?;
        }
        match item_id {
            Some(id) if self.resident_page_of(id).is_some() => self.focus_item(id.clone()),
            _ => self.effects.push(Effect::ScrollToTop),
        }
        Ok(())
    }

    // Local items mode

    /// Drive the list from a caller-supplied item set instead of the fetcher.
    ///
    /// Items are partitioned into synthetic pages of the configured size, the
    /// window spans all of them, and fetching is suppressed until the list is
    /// rebuilt.
    pub fn set_local_items(&mut self, items: Vec<I>) {
        let page_size = self.config.page_size.max(1);
        self.items = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| Resident {
                item,
                page: idx / page_size,
            })
            .collect();
        self.total_pages = self.items.len().div_ceil(page_size);
        self.window = Some(PageWindow {
            start: 0,
            end: self.total_pages.saturating_sub(1),
        });
        self.loaded_pages.clear();
        self.local_mode = true;
    }

    // Internals

    /// Core load-and-merge operation.
    ///
    /// Skips when a fetch is in flight or the page is resident and `force` is
    /// false. State is replaced only after a successful fetch; a failed fetch
    /// leaves every resident item, the window, and the page count untouched.
    async fn load_page_with(
        &mut self,
        page: usize,
        force: bool,
        keep_only: Option<&[usize]>,
    ) -> Result<bool, ScrollError> {
        if self.local_mode {
            return Ok(false);
        }
        if self.loading || (self.loaded_pages.contains(&page) && !force) {
            return Ok(false);
        }
        self.loading = true;
        let fetched = self.fetcher.fetch_page(page).await;
        self.loading = false;
        self.apply_page(page, fetched?, keep_only);
        Ok(true)
    }

    fn apply_page(&mut self, page: usize, result: PageResult<I>, keep_only: Option<&[usize]>) {
        self.total_pages = result.total_pages;
        let existing = std::mem::take(&mut self.items);
        self.items = windowing::merge_page(
            existing,
            result.content,
            page,
            keep_only,
            self.config.sort_order,
        );
        match keep_only {
            Some(keep) => {
                let start = keep.iter().copied().min().unwrap_or(page);
                let end = keep.iter().copied().max().unwrap_or(page);
                self.window = Some(PageWindow { start, end });
                self.loaded_pages = keep.iter().copied().collect();
            }
            None => {
                self.loaded_pages.insert(page);
                // Plain loads widen the window so residency stays inside it.
                self.window = Some(match self.window {
                    None => PageWindow::single(page),
                    Some(w) => PageWindow {
                        start: w.start.min(page),
                        end: w.end.max(page),
                    },
                });
            }
        }
    }

    /// Linear fallback when the server lookup is unavailable or failed:
    /// force-load pages from zero upward until the item appears.
    ///
    /// `total_pages` is snapshotted as the scan bound; growth observed
    /// mid-scan feeds later operations, not this loop.
    async fn scan_for_item(&mut self, item_id: &I::Id) -> Result<(), ScrollError> {
        let bound = self.total_pages;
        let mut found = self.resident_page_of(item_id);
        let mut page = 0;
        while found.is_none() && page < bound {
            self.load_page_with(page, true, None).await?;
            found = self.resident_page_of(item_id);
            page += 1;
        }
        let Some(found_page) = found else {
            tracing::debug!(scanned = bound, "item not found in any page");
            return Ok(());
        };
        self.items.retain(|r| r.page == found_page);
        self.loaded_pages = BTreeSet::from([found_page]);
        self.window = Some(PageWindow::single(found_page));
        self.focus_item(item_id.clone());
        Ok(())
    }

    fn focus_item(&mut self, item_id: I::Id) {
        self.highlighted = Some(item_id.clone());
        self.effects.push(Effect::ScrollToItem(item_id));
    }
}

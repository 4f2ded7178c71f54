use chrono::NaiveDate;
use serde::Serialize;

/// The three dimensions that scope a working set. Any change forces a full reseed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewKey {
    pub group_id: String,
    pub date: NaiveDate,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    page: u32,
    page_size: u32,
    total_count: u64,
}

impl PageWindow {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total_count: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u32 {
        let size = u64::from(self.page_size);
        let pages = self.total_count.div_ceil(size);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn last_page(&self) -> u32 {
        self.total_pages().max(1)
    }

    pub fn contains(&self, page: u32) -> bool {
        (1..=self.last_page()).contains(&page)
    }

    /// Records the group's member count and clamps the current page into range.
    pub fn set_total_count(&mut self, total_count: u64) {
        self.total_count = total_count;
        self.page = self.page.clamp(1, self.last_page());
    }

    /// Moves to `page` if it is in range. Returns false and leaves the window untouched otherwise.
    pub fn go_to(&mut self, page: u32) -> bool {
        if !self.contains(page) {
            return false;
        }
        self.page = page;
        true
    }

    /// Back to page 1 with an unknown total, as after a group or date change.
    pub fn reset(&mut self) {
        self.page = 1;
        self.total_count = 0;
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Error { code: String, message: String },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let mut w = PageWindow::new(100);
        w.set_total_count(150);
        assert_eq!(w.total_pages(), 2);
        w.set_total_count(200);
        assert_eq!(w.total_pages(), 2);
        w.set_total_count(0);
        assert_eq!(w.total_pages(), 0);
        assert_eq!(w.last_page(), 1);
    }

    #[test]
    fn out_of_range_page_is_rejected() {
        let mut w = PageWindow::new(100);
        w.set_total_count(150);
        assert!(!w.go_to(3));
        assert!(!w.go_to(0));
        assert_eq!(w.page(), 1);
        assert!(w.go_to(2));
        assert_eq!(w.offset(), 100);
    }

    #[test]
    fn shrinking_total_clamps_page() {
        let mut w = PageWindow::new(10);
        w.set_total_count(35);
        assert!(w.go_to(4));
        w.set_total_count(12);
        assert_eq!(w.page(), 2);
    }
}

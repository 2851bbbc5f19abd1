//! Bounds-checked flash ranges
//!
//! A [`FlashSpan`] can only be obtained from a [`FlashWindow`], so holding
//! one proves the range lies inside the window.

use super::FlashError;
use crate::config::flash::{FLASH_PAGE_SIZE, USERFLASH_END, USERFLASH_START};

/// Contiguous, page-aligned region that may be read, programmed and erased
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashWindow {
    start: u32,
    end: u32,
    page_size: u32,
}

impl FlashWindow {
    /// The user flash window of this board
    pub const USER: Self = Self::new(USERFLASH_START, USERFLASH_END, FLASH_PAGE_SIZE);

    /// Create a window `[start, end)` with the given page size
    #[must_use]
    pub const fn new(start: u32, end: u32, page_size: u32) -> Self {
        Self {
            start,
            end,
            page_size,
        }
    }

    /// First address
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// One past the last address
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Erase page size
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Whether `address` is inside the window
    #[must_use]
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }

    /// The whole window as a span
    #[must_use]
    pub const fn full(&self) -> FlashSpan {
        FlashSpan {
            start: self.start,
            len: self.end - self.start,
            page_size: self.page_size,
        }
    }

    /// Checked span `[address, address + len)`
    ///
    /// # Errors
    ///
    /// [`FlashError::OutOfRange`] unless the whole range lies in the window.
    pub fn span(&self, address: u32, len: usize) -> Result<FlashSpan, FlashError> {
        let len = u32::try_from(len).map_err(|_| FlashError::OutOfRange)?;
        let end = address.checked_add(len).ok_or(FlashError::OutOfRange)?;
        if address < self.start || end > self.end {
            return Err(FlashError::OutOfRange);
        }
        Ok(FlashSpan {
            start: address,
            len,
            page_size: self.page_size,
        })
    }

    /// The single page starting at `address`
    ///
    /// # Errors
    ///
    /// [`FlashError::OutOfRange`] outside the window,
    /// [`FlashError::Misaligned`] if `address` is not a page start.
    pub fn page(&self, address: u32) -> Result<FlashSpan, FlashError> {
        let span = self.span(address, self.page_size as usize)?;
        if (address - self.start) % self.page_size != 0 {
            return Err(FlashError::Misaligned);
        }
        Ok(span)
    }
}

/// Validated range inside a [`FlashWindow`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashSpan {
    start: u32,
    len: u32,
    page_size: u32,
}

impl FlashSpan {
    /// First address
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// One past the last address
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.start + self.len
    }

    /// Length in bytes
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the span covers no bytes
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start addresses of every page overlapping the span
    #[must_use]
    pub const fn pages(&self) -> PageIter {
        if self.len == 0 {
            return PageIter {
                next: 0,
                last: 0,
                step: self.page_size,
                done: true,
            };
        }
        PageIter {
            next: self.start - self.start % self.page_size,
            last: (self.end() - 1) - (self.end() - 1) % self.page_size,
            step: self.page_size,
            done: false,
        }
    }
}

/// Iterator over page start addresses
#[derive(Clone, Debug)]
pub struct PageIter {
    next: u32,
    last: u32,
    step: u32,
    done: bool,
}

impl Iterator for PageIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.done {
            return None;
        }
        let page = self.next;
        if page >= self.last {
            self.done = true;
        } else {
            self.next += self.step;
        }
        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: FlashWindow = FlashWindow::new(0x1000, 0x3000, 0x800);

    #[test]
    fn test_span_at_window_end() {
        assert!(W.span(0x2FFF, 1).is_ok());
        assert_eq!(W.span(0x2FFF, 2), Err(FlashError::OutOfRange));
        assert_eq!(W.span(u32::MAX, 2), Err(FlashError::OutOfRange));
    }

    #[test]
    fn test_pages_overlapping_unaligned_span() {
        let span = W.span(0x17F0, 0x20).unwrap();
        let pages: std::vec::Vec<u32> = span.pages().collect();
        assert_eq!(pages, [0x1000, 0x1800]);
    }

    #[test]
    fn test_empty_span_has_no_pages() {
        assert_eq!(W.span(0x1000, 0).unwrap().pages().count(), 0);
    }
}

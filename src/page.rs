//! Pages and the link between them.
//!
//! A physical [`Frame`] and a [`LogicalPage`] are linked symmetrically: each
//! side records the other's [`PageId`]. [`allocate`] and [`deallocate`] update
//! both sides in a single call, so a link always exists on both ends or on
//! neither. The frame owns the cell array while linked; the logical page
//! reaches it through the frame number it is linked to.

use std::fmt;

use log::debug;

use crate::error::{MemoryError, Result};
use crate::memory::PhysicalMemory;
use crate::word::Word;

/// Identifies the page table a logical page belongs to
pub type TableId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Frame,
    Logical,
}

/// Globally unique page identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageId {
    Frame(usize),
    Logical { table: TableId, page: usize },
}

impl PageId {
    pub fn kind(&self) -> PageKind {
        match self {
            PageId::Frame(_) => PageKind::Frame,
            PageId::Logical { .. } => PageKind::Logical,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageId::Frame(n) => write!(f, "frame {}", n),
            PageId::Logical { table, page } => write!(f, "logical page {} of table {}", page, table),
        }
    }
}

mod private {
    use super::PageId;

    pub trait Linkable {
        fn attach(&mut self, other: PageId);
        fn detach(&mut self);
    }
}

use private::Linkable;

/// Shared contract of frames and logical pages
pub trait Page: private::Linkable {
    fn id(&self) -> PageId;

    /// The page the other end of the link is, if any
    fn allocated_to(&self) -> Option<PageId>;

    fn number(&self) -> usize {
        match self.id() {
            PageId::Frame(n) => n,
            PageId::Logical { page, .. } => page,
        }
    }

    fn kind(&self) -> PageKind {
        self.id().kind()
    }

    fn is_allocated(&self) -> bool {
        self.allocated_to().is_some()
    }
}

/// Link `page` and `other` to each other.
///
/// Linking two pages that are already linked to each other is a no-op.
pub fn allocate(page: &mut dyn Page, other: &mut dyn Page) -> Result<()> {
    let (page_id, other_id) = (page.id(), other.id());
    if page.allocated_to() == Some(other_id) && other.allocated_to() == Some(page_id) {
        return Ok(());
    }
    if page.kind() == other.kind() {
        return Err(MemoryError::Allocation(format!(
            "cannot allocate {} to {}, frames are only allocated to logical pages",
            page_id, other_id
        )));
    }
    if let Some(current) = page.allocated_to() {
        return Err(MemoryError::Allocation(format!(
            "{} is already allocated to {}",
            page_id, current
        )));
    }
    if let Some(current) = other.allocated_to() {
        return Err(MemoryError::Allocation(format!(
            "{} is already allocated to {}",
            other_id, current
        )));
    }

    page.attach(other_id);
    other.attach(page_id);
    debug!("linked {} <-> {}", page_id, other_id);
    Ok(())
}

/// Break the link between `page` and `other`, discarding the cell contents
pub fn deallocate(page: &mut dyn Page, other: &mut dyn Page) -> Result<()> {
    let (page_id, other_id) = (page.id(), other.id());
    if page.kind() == other.kind() {
        return Err(MemoryError::Allocation(format!(
            "cannot deallocate {} from {}, pages of the same kind are never linked",
            page_id, other_id
        )));
    }
    if page.allocated_to() != Some(other_id) {
        return Err(MemoryError::Allocation(format!(
            "{} is not allocated to {}",
            page_id, other_id
        )));
    }
    // A page carrying the right id but not holding the link is not the owner
    if other.allocated_to() != Some(page_id) {
        return Err(MemoryError::Allocation(format!(
            "{} is not allocated to {}",
            other_id, page_id
        )));
    }

    other.detach();
    page.detach();
    debug!("unlinked {} <-> {}", page_id, other_id);
    Ok(())
}

/// A block of real memory
#[derive(Debug)]
pub struct Frame {
    number: usize,
    size: usize,
    allocated_to: Option<PageId>,
    cells: Option<Box<[Word]>>,
}

impl Frame {
    pub fn new(number: usize, size: usize) -> Self {
        Frame {
            number,
            size,
            allocated_to: None,
            cells: None,
        }
    }

    /// Words in this frame
    pub fn size(&self) -> usize {
        self.size
    }

    /// The linked cell array
    pub fn cells(&self) -> Result<&[Word]> {
        self.cells.as_deref().ok_or_else(|| self.unallocated())
    }

    pub fn read(&self, offset: usize) -> Result<Word> {
        let cells = self.cells()?;
        cells
            .get(offset)
            .copied()
            .ok_or(MemoryError::out_of_range("page offset", offset, self.size))
    }

    pub fn write(&mut self, offset: usize, word: Word) -> Result<()> {
        let size = self.size;
        let number = self.number;
        let cells = self.cells.as_deref_mut().ok_or_else(|| unallocated_frame(number))?;
        let cell = cells
            .get_mut(offset)
            .ok_or(MemoryError::out_of_range("page offset", offset, size))?;
        *cell = word;
        Ok(())
    }

    fn unallocated(&self) -> MemoryError {
        unallocated_frame(self.number)
    }
}

fn unallocated_frame(number: usize) -> MemoryError {
    MemoryError::Allocation(format!("cannot access memory of unallocated frame {}", number))
}

impl Linkable for Frame {
    fn attach(&mut self, other: PageId) {
        self.allocated_to = Some(other);
        self.cells = Some(vec![Word::new(); self.size].into_boxed_slice());
    }

    fn detach(&mut self) {
        self.allocated_to = None;
        self.cells = None;
    }
}

impl Page for Frame {
    fn id(&self) -> PageId {
        PageId::Frame(self.number)
    }

    fn allocated_to(&self) -> Option<PageId> {
        self.allocated_to
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame [Nr: {}, IsAllocated: {}", self.number, self.is_allocated())?;
        if let Some(PageId::Logical { table, page }) = self.allocated_to {
            write!(f, ", AllocatedTo: {}/{}", table, page)?;
        }
        f.write_str("]")
    }
}

/// A process-local page, backed by at most one frame
#[derive(Debug)]
pub struct LogicalPage {
    table: TableId,
    number: usize,
    allocated_to: Option<PageId>,
}

impl LogicalPage {
    pub(crate) fn new(table: TableId, number: usize) -> Self {
        LogicalPage {
            table,
            number,
            allocated_to: None,
        }
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Number of the backing frame
    pub fn frame(&self) -> Option<usize> {
        match self.allocated_to {
            Some(PageId::Frame(n)) => Some(n),
            _ => None,
        }
    }

    pub fn read(&self, memory: &PhysicalMemory, offset: usize) -> Result<Word> {
        let frame = self.frame().ok_or_else(|| self.unallocated())?;
        memory.frame(frame)?.read(offset)
    }

    pub fn write(&self, memory: &mut PhysicalMemory, offset: usize, word: Word) -> Result<()> {
        let frame = self.frame().ok_or_else(|| self.unallocated())?;
        memory.frame_mut(frame)?.write(offset, word)
    }

    fn unallocated(&self) -> MemoryError {
        MemoryError::Allocation(format!(
            "cannot access memory of unallocated logical page {}",
            self.number
        ))
    }
}

impl Linkable for LogicalPage {
    fn attach(&mut self, other: PageId) {
        self.allocated_to = Some(other);
    }

    fn detach(&mut self) {
        self.allocated_to = None;
    }
}

impl Page for LogicalPage {
    fn id(&self) -> PageId {
        PageId::Logical {
            table: self.table,
            page: self.number,
        }
    }

    fn allocated_to(&self) -> Option<PageId> {
        self.allocated_to
    }
}

impl fmt::Display for LogicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Logical Page [Nr: {}, IsAllocated: {}", self.number, self.is_allocated())?;
        if let Some(frame) = self.frame() {
            write!(f, ", AllocatedTo: {}", frame)?;
        }
        f.write_str("]")
    }
}

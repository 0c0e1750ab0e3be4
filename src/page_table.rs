use log::{debug, warn};

use crate::error::{MemoryError, Result};
use crate::memory::PhysicalMemory;
use crate::page::{LogicalPage, Page, TableId};
use crate::translation::VirtualAddress;
use crate::word::Word;

/// Per-process mapping of logical pages onto physical frames.
///
/// Pages are bound to frames on first access (demand paging). The table does
/// not hold on to the physical memory; every operation that may touch frames
/// takes it as an argument.
#[derive(Debug)]
pub struct PageTable {
    id: TableId,
    page_size: usize,
    pages: Vec<LogicalPage>,
}

impl PageTable {
    /// Create a table of unbound pages sized by the memory's configuration
    pub fn new(memory: &mut PhysicalMemory) -> Self {
        let count = memory.config().virtual_page_count;
        Self::with_page_count(memory, count)
    }

    fn with_page_count(memory: &mut PhysicalMemory, count: usize) -> Self {
        let id = memory.next_table_id();
        PageTable {
            id,
            page_size: memory.page_size(),
            pages: (0..count).map(|n| LogicalPage::new(id, n)).collect(),
        }
    }

    /// Eagerly copy this table into fresh frames.
    ///
    /// Every bound page of the source gets its counterpart bound to a new
    /// frame and filled word by word, so the two tables share nothing
    /// afterwards. On failure the frames already claimed by the copy are
    /// returned before the error is passed on.
    pub fn duplicate(&self, memory: &mut PhysicalMemory) -> Result<Self> {
        let mut copy = Self::with_page_count(memory, self.pages.len());
        if let Err(err) = copy.copy_pages_from(self, memory) {
            if let Err(cleanup) = copy.deallocate_all(memory) {
                warn!("table {}: failed to release partial copy: {}", copy.id, cleanup);
            }
            return Err(err);
        }
        debug!(
            "table {} duplicated into table {} ({} pages)",
            self.id,
            copy.id,
            copy.allocated_count()
        );
        Ok(copy)
    }

    fn copy_pages_from(&mut self, source: &PageTable, memory: &mut PhysicalMemory) -> Result<()> {
        for page in &source.pages {
            if let Some(source_frame) = page.frame() {
                let frame = self.frame_of(memory, page.number())?;
                memory.copy_frame(source_frame, frame)?;
            }
        }
        Ok(())
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn pages(&self) -> &[LogicalPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Words of logical memory covered by this table
    pub fn virtual_size(&self) -> usize {
        self.pages.len() * self.page_size
    }

    /// The frame backing logical page `number`, binding a free frame first if
    /// the page has never been touched.
    pub fn frame_of(&mut self, memory: &mut PhysicalMemory, number: usize) -> Result<usize> {
        let count = self.pages.len();
        let page = self
            .pages
            .get_mut(number)
            .ok_or(MemoryError::out_of_range("logical page", number, count))?;
        if let Some(frame) = page.frame() {
            return Ok(frame);
        }

        let frame = memory.find_free_frame()?;
        memory.allocate_frame(frame, page)?;
        debug!("table {}: logical page {} bound to frame {}", self.id, number, frame);
        Ok(frame)
    }

    /// Logical page `number`, bound to a frame
    pub fn page(&mut self, memory: &mut PhysicalMemory, number: usize) -> Result<&LogicalPage> {
        self.frame_of(memory, number)?;
        Ok(&self.pages[number])
    }

    pub fn logical_to_physical(&mut self, memory: &mut PhysicalMemory, address: usize) -> Result<usize> {
        let va = VirtualAddress::from_raw(address, self.page_size);
        let frame = self.frame_of(memory, va.p)?;
        Ok(va.to_physical(frame, self.page_size))
    }

    pub fn read(&mut self, memory: &mut PhysicalMemory, address: usize) -> Result<Word> {
        let physical = self.logical_to_physical(memory, address)?;
        memory.read(physical)
    }

    pub fn write(&mut self, memory: &mut PhysicalMemory, address: usize, word: Word) -> Result<()> {
        let physical = self.logical_to_physical(memory, address)?;
        memory.write(physical, word)
    }

    pub fn is_page_allocated(&self, number: usize) -> Result<bool> {
        self.pages
            .get(number)
            .map(|page| page.is_allocated())
            .ok_or(MemoryError::out_of_range("logical page", number, self.pages.len()))
    }

    /// Number of pages currently bound to a frame
    pub fn allocated_count(&self) -> usize {
        self.pages.iter().filter(|page| page.is_allocated()).count()
    }

    /// Unbind every page from its frame
    pub fn deallocate_all(&mut self, memory: &mut PhysicalMemory) -> Result<()> {
        for page in &mut self.pages {
            if let Some(frame) = page.frame() {
                memory.deallocate_frame(frame, page)?;
            }
        }
        Ok(())
    }
}

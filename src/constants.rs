/// Bytes in one memory word
pub const WORD_SIZE: usize = 4;

/// Words in one page / frame
pub const PAGE_SIZE: usize = 16;

/// Physical frames in real memory
pub const FRAME_COUNT: usize = 64;
pub const PM_SIZE: usize = FRAME_COUNT * PAGE_SIZE;

/// Logical pages in every process's page table
pub const VIRTUAL_PAGE_COUNT: usize = 16;

/// Instructions a process may run before the scheduler moves on
pub const QUANTUM: usize = 10;

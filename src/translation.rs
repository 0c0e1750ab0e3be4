/// Represents the decomposed components of a logical address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualAddress {
    pub va: usize,
    /// Logical page number
    pub p: usize,
    /// Word offset within the page
    pub w: usize,
}

impl VirtualAddress {
    /// Decompose a raw logical address for pages of `page_size` words
    pub fn from_raw(va: usize, page_size: usize) -> Self {
        VirtualAddress {
            va,
            p: va / page_size,
            w: va % page_size,
        }
    }

    /// Physical address of this word once its page is bound to `frame`
    #[inline]
    pub fn to_physical(&self, frame: usize, page_size: usize) -> usize {
        frame * page_size + self.w
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VA({}) = (p={}, w={})", self.va, self.p, self.w)
    }
}

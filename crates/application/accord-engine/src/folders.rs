use accord_core::{FileId, SortColumn};

/// Navigation state of one visited folder. Lazily created on first entry
/// and kept for the rest of the run so sort and selection survive leaving
/// and returning.
#[derive(Debug, Clone)]
pub struct FolderView {
    pub selected_id: Option<FileId>,
    pub selected_idx: usize,
    pub offset_idx: usize,
    pub sort_column: SortColumn,
    pub sort_ascending: [bool; 4],
}

impl Default for FolderView {
    fn default() -> Self {
        Self {
            selected_id: None,
            selected_idx: 0,
            offset_idx: 0,
            sort_column: SortColumn::Name,
            sort_ascending: [true, false, false, false],
        }
    }
}

impl FolderView {
    pub fn ascending(&self) -> bool {
        self.sort_ascending[self.sort_column.index()]
    }

    /// Clicking the active column toggles its direction; clicking another
    /// column switches to it without toggling.
    pub fn sort_by(&mut self, column: SortColumn) {
        if column == self.sort_column {
            let idx = column.index();
            self.sort_ascending[idx] = !self.sort_ascending[idx];
        } else {
            self.sort_column = column;
        }
    }
}

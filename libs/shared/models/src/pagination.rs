use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Slice one page out of `items`. A missing or zero page number yields the first
    /// page; a number past the end yields the last page.
    pub fn paginate(items: Vec<T>, page: Option<usize>, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        let total = items.len();
        let total_pages = total.div_ceil(per_page).max(1);
        let page = page.unwrap_or(1).clamp(1, total_pages);

        let items: Vec<T> = items
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
        }
    }
}

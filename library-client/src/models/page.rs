use super::document::{Document, PaginatedDocumentsResponse};

/// One loaded page of the library, as owned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Document>,
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl Page {
    /// Build a page from a server response, enforcing
    /// `1 <= current_page <= total_pages` and `items.len() <= page_size`.
    pub fn from_response(response: PaginatedDocumentsResponse, requested_size: u32) -> Self {
        let page_size = if response.page_size == 0 {
            requested_size.max(1)
        } else {
            response.page_size
        };
        let total_pages = response.total_pages.max(1);
        let current_page = response.current_page.clamp(1, total_pages);

        let mut items = response.documents;
        if items.len() > page_size as usize {
            tracing::warn!(
                received = items.len(),
                page_size,
                "Library page larger than page size, truncating"
            );
            items.truncate(page_size as usize);
        }

        Self {
            items,
            total_count: response.total_count,
            current_page,
            page_size,
            total_pages,
        }
    }

    /// A single page holding exactly `items`, used when documents are
    /// installed before anything was fetched.
    pub fn standalone(items: Vec<Document>, page_size: u32) -> Self {
        let page_size = page_size.max(1).max(items.len() as u32);
        Self {
            total_count: items.len() as u64,
            items,
            current_page: 1,
            page_size,
            total_pages: 1,
        }
    }

    pub fn pending_set(&self) -> PendingSet {
        PendingSet::from_documents(&self.items)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.items.iter_mut().find(|doc| doc.id == id)
    }
}

/// Ids of the documents whose status is `Processing`, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSet {
    ids: Vec<String>,
}

impl PendingSet {
    pub fn from_documents(documents: &[Document]) -> Self {
        Self {
            ids: documents
                .iter()
                .filter(|doc| doc.status.is_pending())
                .map(|doc| doc.id.clone())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|pending| pending == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.clone()
    }
}

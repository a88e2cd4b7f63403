use super::{client::DiskClient, models::ResourceRecord};
use crate::error::{DiskError, Result};
use reqwest::Method;
use serde_json::Value;

/// Items requested per listing round.
pub const PAGE_SIZE: u32 = 20;

/// Upper bound on listing rounds; a server that never sends an empty page
/// stops here instead of looping forever.
pub const MAX_PAGES: u32 = 10_000;

/// Walks a paginated listing.
///
/// `fetch(limit, offset)` is called with offsets `0, PAGE_SIZE, 2*PAGE_SIZE…`
/// strictly in order. Each item is handed to `on_item` as it is mapped. A page
/// with zero items ends the walk; a document that is a single resource (a
/// plain file, or a directory without embedded items) is delivered once and
/// also ends it. On the first error `on_item` receives `Err` and the error is
/// returned.
pub fn list_paged<F, C>(mut fetch: F, mut on_item: C) -> Result<()>
where
    F: FnMut(u32, u32) -> Result<Value>,
    C: FnMut(std::result::Result<ResourceRecord, &DiskError>),
{
    for round in 0..MAX_PAGES {
        let offset = round * PAGE_SIZE;
        let page = fetch(PAGE_SIZE, offset).and_then(|json| classify_page(&json));
        let page = match page {
            Ok(page) => page,
            Err(err) => {
                on_item(Err(&err));
                return Err(err);
            }
        };

        match page {
            Page::Items(items) if items.is_empty() => return Ok(()),
            Page::Items(items) => {
                log::trace!("[disk-list] offset {offset}: {} items", items.len());
                items.into_iter().for_each(|record| on_item(Ok(record)));
            }
            Page::Single(record) => {
                on_item(Ok(record));
                return Ok(());
            }
        }
    }

    let err = DiskError::Protocol(format!(
        "listing did not terminate after {MAX_PAGES} pages"
    ));
    on_item(Err(&err));
    Err(err)
}

enum Page {
    Items(Vec<ResourceRecord>),
    Single(ResourceRecord),
}

/// Newer endpoints nest the page under `_embedded.items`; `resources/public`
/// and friends return `items` at the top level.
fn classify_page(json: &Value) -> Result<Page> {
    let items = json
        .get("_embedded")
        .and_then(|embedded| embedded.get("items"))
        .or_else(|| json.get("items"))
        .and_then(Value::as_array);

    if let Some(items) = items {
        return Ok(Page::Items(
            items.iter().map(ResourceRecord::from_json).collect(),
        ));
    }
    if json.get("path").is_some() {
        return Ok(Page::Single(ResourceRecord::from_json(json)));
    }
    Err(DiskError::from_document(json, "path"))
}

impl DiskClient {
    /// Lists a directory (or describes a single file) page by page.
    pub fn ls<C>(&self, path: &str, on_item: C) -> Result<()>
    where
        C: FnMut(std::result::Result<ResourceRecord, &DiskError>),
    {
        list_paged(
            |limit, offset| {
                self.api_call(
                    Method::GET,
                    "v1/disk/resources",
                    None,
                    &[
                        ("path", path),
                        ("limit", &limit.to_string()),
                        ("offset", &offset.to_string()),
                    ],
                )
            },
            on_item,
        )
    }

    /// Collects a whole listing into memory.
    pub fn ls_all(&self, path: &str) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::new();
        self.ls(path, |item| {
            if let Ok(record) = item {
                records.push(record);
            }
        })?;
        Ok(records)
    }

    /// Lists the caller's own published resources.
    pub fn ls_public<C>(&self, on_item: C) -> Result<()>
    where
        C: FnMut(std::result::Result<ResourceRecord, &DiskError>),
    {
        list_paged(
            |limit, offset| {
                self.api_call(
                    Method::GET,
                    "v1/disk/resources/public",
                    None,
                    &[
                        ("limit", &limit.to_string()),
                        ("offset", &offset.to_string()),
                    ],
                )
            },
            on_item,
        )
    }

    /// Lists a public resource shared by someone else, by key or public URL.
    pub fn public_ls<C>(&self, public_key: &str, on_item: C) -> Result<()>
    where
        C: FnMut(std::result::Result<ResourceRecord, &DiskError>),
    {
        list_paged(
            |limit, offset| {
                self.api_call(
                    Method::GET,
                    "v1/disk/public/resources",
                    None,
                    &[
                        ("public_key", public_key),
                        ("limit", &limit.to_string()),
                        ("offset", &offset.to_string()),
                    ],
                )
            },
            on_item,
        )
    }

    /// Lists the trash.
    pub fn trash_ls<C>(&self, on_item: C) -> Result<()>
    where
        C: FnMut(std::result::Result<ResourceRecord, &DiskError>),
    {
        list_paged(
            |limit, offset| {
                self.api_call(
                    Method::GET,
                    "v1/disk/trash/resources",
                    None,
                    &[
                        ("limit", &limit.to_string()),
                        ("offset", &offset.to_string()),
                    ],
                )
            },
            on_item,
        )
    }
}

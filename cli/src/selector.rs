//! Paginated "choose one or create a new one" workflow over a remote resource collection.
use anyhow::{bail, Result};
use fuga_client::Page;
use log::debug;
use std::collections::VecDeque;

use crate::{
    errors::SelectionError,
    prompt::{choose_valid, Menu, PromptProvider},
};

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// A remote resource that can be offered in a menu.
pub trait Selectable {
    /// Identifier persisted in the configuration.
    fn id(&self) -> &str;

    fn display_name(&self) -> String;

    fn label(&self) -> String {
        format!("{} ({})", self.display_name(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPage<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

impl<T> From<Page<T>> for SelectionPage<T> {
    fn from(page: Page<T>) -> Self {
        Self {
            items: page.items,
            next_page_token: page.next_page_token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creation {
    Supported,
    Unsupported { notice: String },
}

pub trait ResourceCollection {
    type Item: Selectable;

    /// Singular, human readable name, e.g. "GCS bucket".
    fn name(&self) -> &str;

    fn list_page(&self, page_token: Option<&str>) -> Result<SelectionPage<Self::Item>>;

    fn creation(&self) -> Creation {
        Creation::Supported
    }

    fn create(&self, _prompt: &mut dyn PromptProvider) -> Result<Self::Item> {
        bail!("Creating a new {} is not supported.", self.name())
    }
}

/// Lazily walks the pages of a collection, one item at a time.
struct Listing<'c, C: ResourceCollection> {
    collection: &'c C,
    pending: VecDeque<C::Item>,
    next_page_token: Option<String>,
    started: bool,
}

impl<'c, C: ResourceCollection> Listing<'c, C> {
    fn new(collection: &'c C) -> Self {
        Self {
            collection,
            pending: VecDeque::new(),
            next_page_token: None,
            started: false,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.started && self.pending.is_empty() && self.next_page_token.is_none()
    }

    fn next_item(&mut self) -> Result<Option<C::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            if self.is_exhausted() {
                return Ok(None);
            }
            debug!(
                "Listing {}s (page token: {:?})",
                self.collection.name(),
                self.next_page_token
            );
            let page = self.collection.list_page(self.next_page_token.as_deref())?;
            self.started = true;
            self.next_page_token = page.next_page_token;
            self.pending.extend(page.items);
        }
    }

    fn take(&mut self, count: usize) -> Result<Vec<C::Item>> {
        let mut items = Vec::with_capacity(count);
        while items.len() < count {
            match self.next_item()? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    fn restart(&mut self) {
        self.pending.clear();
        self.next_page_token = None;
        self.started = false;
    }
}

pub struct ResourceSelector<'p> {
    prompt: &'p mut dyn PromptProvider,
    page_size: usize,
}

impl<'p> ResourceSelector<'p> {
    pub fn new(prompt: &'p mut dyn PromptProvider) -> Self {
        Self {
            prompt,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[cfg(test)]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Let the user pick one resource of `collection`, or create a new one.
    pub fn select<C: ResourceCollection>(&mut self, collection: &C) -> Result<C::Item> {
        let creation = collection.creation();
        let mut listing = Listing::new(collection);
        let mut paged = false;

        loop {
            let mut buffer = listing.take(self.page_size)?;

            if buffer.is_empty() {
                match &creation {
                    _ if paged => {
                        debug!("No more {}s, listing from the start.", collection.name());
                        listing.restart();
                        paged = false;
                        continue;
                    }
                    Creation::Unsupported { notice } => {
                        return Err(SelectionError::NoResources {
                            collection: collection.name().to_owned(),
                            hint: notice.clone(),
                        }
                        .into())
                    }
                    Creation::Supported => {}
                }
            }

            let has_next = buffer.len() == self.page_size && !listing.is_exhausted();
            let menu = self.menu(collection.name(), &creation, &buffer, has_next);
            let next_page = buffer.len() + 1;

            match choose_valid(self.prompt, &menu)? {
                0 => return collection.create(self.prompt),
                choice if choice == next_page => paged = true,
                choice => return Ok(buffer.swap_remove(choice - 1)),
            }
        }
    }

    fn menu<T: Selectable>(
        &self,
        name: &str,
        creation: &Creation,
        items: &[T],
        has_next: bool,
    ) -> Menu {
        let mut menu = Menu::new(format!("Please choose a {name} to use with fuga."));
        match creation {
            Creation::Supported => menu.push(0, "Create new (recommended)"),
            Creation::Unsupported { notice } => menu = menu.with_notice(notice.as_str()),
        }
        for (index, item) in items.iter().enumerate() {
            menu.push(index + 1, item.label());
        }
        if has_next {
            menu.push(
                items.len() + 1,
                format!("Show next {} {}s", self.page_size, name),
            );
        }
        menu
    }
}

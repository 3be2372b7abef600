// Grid adapter binding gallery items to recyclable rows
// Each row slot owns its own widget pair; holders live in a slot-keyed map

use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, trace};

use crate::error::Result;
use crate::models::{GalleryStore, ImageItem};

/// Widget that displays an item's title.
pub trait TitleView {
    fn set_title(&mut self, title: &str);
}

/// Widget that displays an item's bitmap.
pub trait ImageView {
    fn set_image(&mut self, image: &DynamicImage);

    /// Drop whatever is displayed. Called when a row is unbound.
    fn clear_image(&mut self) {}
}

/// Builds the widgets of a freshly constructed row.
///
/// Hosts implement this on top of their toolkit's layout inflation. Every call
/// must return widgets distinct from those of other slots.
pub trait RowInflater {
    type Title: TitleView;
    type Image: ImageView;

    fn inflate(&mut self, slot: RowSlot) -> (Self::Title, Self::Image);
}

/// Identity of a visual row, stable while the host keeps that row alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowSlot(u32);

impl RowSlot {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

/// How a row was produced by [`GridAdapter::get_view`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// The row was built and its holder created.
    Fresh,
    /// An existing holder was rebound.
    Recycled,
}

/// A row ready for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundRow {
    pub slot: RowSlot,
    pub state: RowState,
    pub position: usize,
}

/// The widgets attached to one row.
#[derive(Debug)]
pub struct ViewHolder<T, I> {
    pub title: T,
    pub image: I,
    position: Option<usize>,
}

impl<T: TitleView, I: ImageView> ViewHolder<T, I> {
    fn new(title: T, image: I) -> Self {
        Self {
            title,
            image,
            position: None,
        }
    }

    fn bind(&mut self, position: usize, item: &ImageItem) {
        self.title.set_title(item.title());
        self.image.set_image(item.image());
        self.position = Some(position);
    }

    fn unbind(&mut self) {
        self.title.set_title("");
        self.image.clear_image();
        self.position = None;
    }

    /// Position currently bound to this row, if any.
    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

/// Binds gallery positions to recyclable rows.
pub struct GridAdapter<F: RowInflater> {
    store: Arc<GalleryStore>,
    inflater: F,
    holders: HashMap<RowSlot, ViewHolder<F::Title, F::Image>>,
    next_slot: u32,
    /// Store generation the holders were built against.
    generation: u64,
}

impl<F: RowInflater> GridAdapter<F> {
    pub fn new(store: Arc<GalleryStore>, inflater: F) -> Self {
        let generation = store.generation();
        Self {
            store,
            inflater,
            holders: HashMap::new(),
            next_slot: 0,
            generation,
        }
    }

    /// Number of items available for display.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    pub fn item(&self, position: usize) -> Result<Arc<ImageItem>> {
        self.store.item_at(position)
    }

    pub fn store(&self) -> &Arc<GalleryStore> {
        &self.store
    }

    pub fn inflater(&self) -> &F {
        &self.inflater
    }

    /// Produce a populated row for `position`.
    ///
    /// `convert` is a row previously returned by this adapter that the host
    /// wants to reuse. Without one, or when its holder was dropped by a reload
    /// or [`release`](Self::release), a fresh row is built.
    pub fn get_view(&mut self, position: usize, convert: Option<RowSlot>) -> Result<BoundRow> {
        self.sync_generation();
        let item = self.store.item_at(position)?;

        let recycled = convert.is_some_and(|slot| self.holders.contains_key(&slot));
        let slot = match convert {
            Some(slot) => {
                self.next_slot = self.next_slot.max(slot.index().saturating_add(1));
                slot
            }
            None => self.allocate_slot(),
        };

        let inflater = &mut self.inflater;
        let holder = self.holders.entry(slot).or_insert_with(|| {
            trace!(slot = slot.index(), "Inflating row");
            let (title, image) = inflater.inflate(slot);
            ViewHolder::new(title, image)
        });
        holder.bind(position, &item);

        let state = if recycled {
            RowState::Recycled
        } else {
            RowState::Fresh
        };
        trace!(slot = slot.index(), position, ?state, "Bound row");

        Ok(BoundRow {
            slot,
            state,
            position,
        })
    }

    /// Reset a row's widgets while keeping its holder for reuse.
    pub fn unbind(&mut self, slot: RowSlot) {
        if let Some(holder) = self.holders.get_mut(&slot) {
            holder.unbind();
        }
    }

    /// Forget a row the host has destroyed. Returns false for unknown slots.
    pub fn release(&mut self, slot: RowSlot) -> bool {
        match self.holders.remove(&slot) {
            Some(mut holder) => {
                holder.unbind();
                true
            }
            None => false,
        }
    }

    pub fn holder(&self, slot: RowSlot) -> Option<&ViewHolder<F::Title, F::Image>> {
        self.holders.get(&slot)
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Drop every holder; the next request for any slot rebuilds it.
    pub fn clear(&mut self) {
        self.holders.clear();
    }

    fn allocate_slot(&mut self) -> RowSlot {
        let slot = RowSlot(self.next_slot);
        self.next_slot = self.next_slot.saturating_add(1);
        slot
    }

    fn sync_generation(&mut self) {
        let generation = self.store.generation();
        if generation != self.generation {
            debug!(
                old = self.generation,
                new = generation,
                holders = self.holders.len(),
                "Gallery reloaded, dropping row holders"
            );
            self.holders.clear();
            self.generation = generation;
        }
    }
}

pub mod grid_adapter;
pub mod widgets;

pub use grid_adapter::{
    BoundRow, GridAdapter, ImageView, RowInflater, RowSlot, RowState, TitleView, ViewHolder,
};
pub use widgets::{HeadlessInflater, Label, Picture};

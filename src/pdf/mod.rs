pub mod compose;
pub mod overlay;

pub use compose::compose_certificate;
pub use overlay::{
    load_font, render_overlay, resolve_x, resolve_y, text_width, HorizontalPlacement, LoadedFont,
    PageGeometry, VerticalPlacement,
};

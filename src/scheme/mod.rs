//! Classification scheme: the code tree and its colors

mod classification;
mod code;
mod color;
mod edit;
mod element;


pub use classification::ClassificationScheme;
pub use code::Code;
pub use color::{ColorSettings, HuePalette, Palette, Rgba};
pub use edit::{LinkChange, Move, MoveOutcome, MoveRejection, Removal};
pub use element::{CodeId, GuideElement, GuideNode, ParentRef};

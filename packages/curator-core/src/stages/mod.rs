//! Built-in processing stages.

mod backlink_count_stage;
mod links_stage;

pub use backlink_count_stage::BacklinkCountStage;
pub use links_stage::{LinksModel, LinksStage};

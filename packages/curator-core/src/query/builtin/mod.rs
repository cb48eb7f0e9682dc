//! Queries every curator ships with.

mod backlinks;
mod dead_links;
mod help;
mod list;
mod table;
mod toc;
mod unknown;

pub use backlinks::BacklinksQuery;
pub use dead_links::DeadLinksQuery;
pub use help::HelpQuery;
pub use list::ListQuery;
pub use table::TableQuery;
pub use toc::TableOfContentsQuery;
pub use unknown::UnknownQuery;

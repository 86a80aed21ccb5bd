//! Field indexing and scripted filling of login forms.
//!
//! [`indexer`] fingerprints every fillable control on a page and describes it
//! for a credential picker; [`fill`] replays the picker's fill script against
//! the same page. Both run on an in-memory [`dom::Document`], which a
//! [`Page`] snapshots from a live Chrome tab and writes back to it.

pub mod browser;
pub mod config;
pub mod dom;
pub mod error;
pub mod fill;
pub mod indexer;
pub mod page;

pub use browser::AutofillBrowser;
pub use config::{BrowserConfig, EngineConfig, InsecureFillPolicy};
pub use dom::Document;
pub use error::{Error, Result};
pub use fill::{execute_fill_script, FillExecutor, FillReport, FillResponse, FillScript};
pub use indexer::{collect_page_details, FieldDescriptor, FieldIndexer, PageDetails};
pub use page::Page;

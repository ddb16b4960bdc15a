//! Feed ingestion: fetch, parse, normalize, merge.
//!
//! The pipeline runs in four stages, one source at a time:
//!
//! - [`fetcher`] — retrieve the feed document with a bounded timeout and a
//!   distinct client identity
//! - [`parser`] — turn the document into tagged raw entries
//!   ([`RawEntry::Article`] / [`RawEntry::Video`]), preserving the video
//!   platform's extension fields
//! - [`normalizer`] — pure conversion to the canonical item shape
//! - [`engine`] — orchestrate the batch and merge items idempotently into
//!   storage, collecting per-source errors without aborting the run
//!
//! The engine itself is stateless: preventing overlapping runs is the
//! caller's job (an external scheduler or the CLI), not this module's.

mod engine;
mod fetcher;
mod normalizer;
mod parser;
mod thumbnail;

pub use engine::{refresh_all, refresh_source, RefreshError, RefreshSummary};
pub use fetcher::{build_client, fetch_entries, FetchError, FETCH_TIMEOUT, USER_AGENT};
pub use normalizer::normalize;
pub use parser::{parse_article_feed, parse_video_feed, ArticleEntry, RawEntry, VideoEntry};

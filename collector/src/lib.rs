pub mod aggregator;
pub mod normalizer;
pub mod pipeline;
pub mod resolver;
pub mod writer;

pub use aggregator::{
    ActivityAggregator, CommunityCache, Degradation, DegradationKind, ParentPost, RawActivity,
    RawComment,
};
pub use normalizer::{normalize, summarize};
pub use pipeline::{CollectionOutcome, CollectionPipeline};
pub use resolver::resolve_username;
pub use writer::PersistenceWriter;

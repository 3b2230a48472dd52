pub mod documents;
pub mod presentation;
pub mod stats;
pub mod toolbar;

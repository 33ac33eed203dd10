// Frame selection and landmark extraction pipeline

pub mod annotation;
pub mod cohort;
pub mod extraction;
pub mod finalize;
pub mod orchestrator;
pub mod selector;
pub mod timestamp;
pub mod types;

//! Core decision logic for Autopress.
//!
//! This crate holds the category selector and the autonomous publishing
//! cycle, composed with the external collaborators defined in
//! `autopress-shared`, plus the scheduler that runs the cycle per site.

pub mod analysis;
pub mod category;
pub mod cycle;
pub mod image;
pub mod publish;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod topic;
pub mod variation;

pub use category::CategorySelector;
pub use cycle::{CycleOutcome, CycleProgress, PublishingCycle, SilentProgress};
pub use image::{CoverImage, CoverImages};
pub use publish::PendingReport;
pub use retry::GenerationPolicy;
pub use schedule::{Clock, FixedClock, SkipReason, SystemClock};
pub use scheduler::{Scheduler, SiteOutcome};

//! Shared types, error model, and configuration for Autopress.
//!
//! This crate is the foundation depended on by all other Autopress crates.
//! It provides:
//! - [`AutopressError`]: the unified error type
//! - Domain types ([`Article`], [`Site`], [`Category`], [`RunStatistics`])
//! - Collaborator traits ([`ArticleGenerator`], [`ContentPublisher`], ...)
//! - Configuration ([`AppConfig`], config loading)

pub mod collaborators;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use collaborators::{
    ArticleGenerator, ContentPublisher, GenerationRequest, ImageGenerator, MediaSource, PostDraft,
    PublisherFactory, StockPhoto, StockPhotoService, TopicStrategist,
};
pub use config::{
    AnthropicConfig, AppConfig, AutomationConfig, DefaultsConfig, ImageGenerationConfig,
    ScoringConfig, SiteEntry, SiteImageConfig, UnsplashConfig, config_dir, config_file_path,
    default_categories, expand_home, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{AutopressError, Result};
pub use types::{
    Article, ArticleId, ArticleStatus, Category, CategoryId, CategoryProfile, CmsAnalysis,
    CmsCredentials, CmsPost, GeneratedArticle, ImageService, ImageSettings, OperatingWindow,
    PastAnalysis, PublishedPost, RunStatistics, Site, StatEvent, TopicSuggestion,
};
